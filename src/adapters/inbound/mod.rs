mod provider_peer;

pub use provider_peer::ProviderPeer;
