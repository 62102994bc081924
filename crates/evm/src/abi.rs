//! Contract ABIs of the marketplace, the collection factory and the music
//! NFT collections. Only the reads and events the services use are listed.

use ethers::abi::Abi;

use beatchain_core::error::{ChainError, ChainResult};

pub const MARKETPLACE_ABI: &str = r#"[
  {
    "type": "function", "name": "listingCounter", "stateMutability": "view",
    "inputs": [], "outputs": [{ "name": "", "type": "uint256" }]
  },
  {
    "type": "function", "name": "auctionCounter", "stateMutability": "view",
    "inputs": [], "outputs": [{ "name": "", "type": "uint256" }]
  },
  {
    "type": "function", "name": "getActiveListing", "stateMutability": "view",
    "inputs": [{ "name": "listingId", "type": "uint256" }],
    "outputs": [{
      "name": "", "type": "tuple",
      "components": [
        { "name": "seller", "type": "address" },
        { "name": "nftContract", "type": "address" },
        { "name": "tokenId", "type": "uint256" },
        { "name": "price", "type": "uint256" },
        { "name": "isActive", "type": "bool" },
        { "name": "listedAt", "type": "uint256" }
      ]
    }]
  },
  {
    "type": "function", "name": "getActiveAuction", "stateMutability": "view",
    "inputs": [{ "name": "auctionId", "type": "uint256" }],
    "outputs": [{
      "name": "", "type": "tuple",
      "components": [
        { "name": "seller", "type": "address" },
        { "name": "nftContract", "type": "address" },
        { "name": "tokenId", "type": "uint256" },
        { "name": "startingPrice", "type": "uint256" },
        { "name": "currentBid", "type": "uint256" },
        { "name": "currentBidder", "type": "address" },
        { "name": "endTime", "type": "uint256" },
        { "name": "isActive", "type": "bool" },
        { "name": "createdAt", "type": "uint256" }
      ]
    }]
  },
  {
    "type": "event", "name": "ItemListed", "anonymous": false,
    "inputs": [
      { "name": "listingId", "type": "uint256", "indexed": true },
      { "name": "seller", "type": "address", "indexed": true },
      { "name": "nftContract", "type": "address", "indexed": true },
      { "name": "tokenId", "type": "uint256", "indexed": false },
      { "name": "price", "type": "uint256", "indexed": false }
    ]
  },
  {
    "type": "event", "name": "ItemSold", "anonymous": false,
    "inputs": [
      { "name": "listingId", "type": "uint256", "indexed": true },
      { "name": "buyer", "type": "address", "indexed": true },
      { "name": "seller", "type": "address", "indexed": true },
      { "name": "price", "type": "uint256", "indexed": false }
    ]
  },
  {
    "type": "event", "name": "AuctionCreated", "anonymous": false,
    "inputs": [
      { "name": "auctionId", "type": "uint256", "indexed": true },
      { "name": "seller", "type": "address", "indexed": true },
      { "name": "nftContract", "type": "address", "indexed": true },
      { "name": "tokenId", "type": "uint256", "indexed": false },
      { "name": "startingPrice", "type": "uint256", "indexed": false },
      { "name": "endTime", "type": "uint256", "indexed": false }
    ]
  },
  {
    "type": "event", "name": "BidPlaced", "anonymous": false,
    "inputs": [
      { "name": "auctionId", "type": "uint256", "indexed": true },
      { "name": "bidder", "type": "address", "indexed": true },
      { "name": "amount", "type": "uint256", "indexed": false }
    ]
  },
  {
    "type": "event", "name": "AuctionEnded", "anonymous": false,
    "inputs": [
      { "name": "auctionId", "type": "uint256", "indexed": true },
      { "name": "winner", "type": "address", "indexed": true },
      { "name": "winningBid", "type": "uint256", "indexed": false }
    ]
  }
]"#;

pub const FACTORY_ABI: &str = r#"[
  {
    "type": "function", "name": "getAllCollections", "stateMutability": "view",
    "inputs": [], "outputs": [{ "name": "", "type": "address[]" }]
  },
  {
    "type": "function", "name": "getCreatorCollections", "stateMutability": "view",
    "inputs": [{ "name": "creator", "type": "address" }],
    "outputs": [{ "name": "", "type": "address[]" }]
  },
  {
    "type": "event", "name": "CollectionCreated", "anonymous": false,
    "inputs": [
      { "name": "creator", "type": "address", "indexed": true },
      { "name": "collection", "type": "address", "indexed": true },
      { "name": "name", "type": "string", "indexed": false },
      { "name": "symbol", "type": "string", "indexed": false }
    ]
  }
]"#;

pub const COLLECTION_ABI: &str = r#"[
  {
    "type": "function", "name": "totalSupply", "stateMutability": "view",
    "inputs": [], "outputs": [{ "name": "", "type": "uint256" }]
  },
  {
    "type": "function", "name": "ownerOf", "stateMutability": "view",
    "inputs": [{ "name": "tokenId", "type": "uint256" }],
    "outputs": [{ "name": "", "type": "address" }]
  },
  {
    "type": "function", "name": "tokenCreator", "stateMutability": "view",
    "inputs": [{ "name": "tokenId", "type": "uint256" }],
    "outputs": [{ "name": "", "type": "address" }]
  },
  {
    "type": "function", "name": "getMusicMetadata", "stateMutability": "view",
    "inputs": [{ "name": "tokenId", "type": "uint256" }],
    "outputs": [{
      "name": "", "type": "tuple",
      "components": [
        { "name": "title", "type": "string" },
        { "name": "artist", "type": "string" },
        { "name": "genre", "type": "string" },
        { "name": "duration", "type": "uint256" },
        { "name": "audioUrl", "type": "string" },
        { "name": "coverArt", "type": "string" },
        { "name": "createdAt", "type": "uint256" },
        { "name": "isAIGenerated", "type": "bool" }
      ]
    }]
  }
]"#;

/// Parsed ABIs of the three contract families.
#[derive(Debug, Clone)]
pub struct ContractAbis {
    pub marketplace: Abi,
    pub factory: Abi,
    pub collection: Abi,
}

impl ContractAbis {
    pub fn load() -> ChainResult<Self> {
        Ok(Self {
            marketplace: parse(MARKETPLACE_ABI, "marketplace")?,
            factory: parse(FACTORY_ABI, "factory")?,
            collection: parse(COLLECTION_ABI, "collection")?,
        })
    }
}

fn parse(json: &str, name: &str) -> ChainResult<Abi> {
    serde_json::from_str(json)
        .map_err(|e| ChainError::DecodingError(format!("Invalid {} ABI: {}", name, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use beatchain_core::ports::{EventSource, LogEventKind};

    #[test]
    fn test_abis_parse() {
        let abis = ContractAbis::load().unwrap();
        assert!(abis.marketplace.function("getActiveAuction").is_ok());
        assert!(abis.factory.function("getCreatorCollections").is_ok());
        assert!(abis.collection.function("getMusicMetadata").is_ok());
    }

    #[test]
    fn test_every_scanned_event_is_declared_by_its_source() {
        let abis = ContractAbis::load().unwrap();
        for kind in LogEventKind::ALL {
            let abi = match kind.source() {
                EventSource::Marketplace => &abis.marketplace,
                EventSource::Factory => &abis.factory,
            };
            assert!(abi.event(kind.name()).is_ok(), "{} missing", kind.name());
        }
    }

    #[test]
    fn test_item_listed_layout() {
        let abis = ContractAbis::load().unwrap();
        let event = abis.marketplace.event("ItemListed").unwrap();
        let indexed = event.inputs.iter().filter(|p| p.indexed).count();
        assert_eq!(indexed, 3);
        let names: Vec<&str> = event.inputs.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["listingId", "seller", "nftContract", "tokenId", "price"]);
    }
}
