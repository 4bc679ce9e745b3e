//! EVM RPC client wrapper.
//!
//! Provides a high-level client for interacting with the EVM source chain
//! via JSON-RPC, with or without a signer attached.

use alloy::{
    network::EthereumWallet,
    primitives::{Address, U256},
    providers::{Provider, ProviderBuilder, RootProvider},
    signers::local::PrivateKeySigner,
    transports::http::{Client, Http},
};
use eyre::{eyre, Result};
use tracing::info;

/// EVM client configuration.
#[derive(Debug, Clone)]
pub struct EvmClientConfig {
    pub rpc_url: String,
    pub chain_id: u64,
    pub private_key: Option<String>,
}

/// Read-only EVM RPC client.
pub struct EvmClientReadOnly {
    pub provider: RootProvider<Http<Client>>,
    pub chain_id: u64,
}

impl EvmClientReadOnly {
    pub async fn new(rpc_url: &str, chain_id: u64) -> Result<Self> {
        let provider = ProviderBuilder::new().on_http(
            rpc_url
                .parse()
                .map_err(|e| eyre!("Invalid RPC URL: {}", e))?,
        );

        info!(rpc_url = %rpc_url, chain_id = chain_id, "created read-only EVM client");

        Ok(Self { provider, chain_id })
    }

    pub async fn get_block_number(&self) -> Result<u64> {
        Ok(self.provider.get_block_number().await?)
    }

    pub async fn get_balance(&self, address: Address) -> Result<U256> {
        Ok(self.provider.get_balance(address).await?)
    }

    pub async fn get_chain_id(&self) -> Result<u64> {
        Ok(self.provider.get_chain_id().await?)
    }
}

/// EVM RPC client with signing capabilities, used for escrow writes.
pub struct EvmClientWithSigner {
    #[allow(clippy::type_complexity)]
    pub provider: alloy::providers::fillers::FillProvider<
        alloy::providers::fillers::JoinFill<
            alloy::providers::Identity,
            alloy::providers::fillers::WalletFiller<EthereumWallet>,
        >,
        RootProvider<Http<Client>>,
        Http<Client>,
        alloy::network::Ethereum,
    >,
    pub chain_id: u64,
    pub signer_address: Address,
}

impl EvmClientWithSigner {
    pub async fn new(rpc_url: &str, chain_id: u64, private_key: &str) -> Result<Self> {
        let signer: PrivateKeySigner = private_key
            .parse()
            .map_err(|e| eyre!("Invalid private key: {}", e))?;

        let address = signer.address();
        let wallet = EthereumWallet::from(signer);

        let provider = ProviderBuilder::new().wallet(wallet).on_http(
            rpc_url
                .parse()
                .map_err(|e| eyre!("Invalid RPC URL: {}", e))?,
        );

        info!(
            rpc_url = %rpc_url,
            chain_id = chain_id,
            address = %address,
            "created EVM client with signer"
        );

        Ok(Self {
            provider,
            chain_id,
            signer_address: address,
        })
    }

    pub async fn get_block_number(&self) -> Result<u64> {
        Ok(self.provider.get_block_number().await?)
    }

    pub async fn get_chain_id(&self) -> Result<u64> {
        Ok(self.provider.get_chain_id().await?)
    }

    pub fn get_signer_address(&self) -> Address {
        self.signer_address
    }
}

/// Unified EVM client, either read-only or with a signer attached.
pub enum EvmClient {
    ReadOnly(EvmClientReadOnly),
    WithSigner(EvmClientWithSigner),
}

impl EvmClient {
    pub async fn new_readonly(rpc_url: &str, chain_id: u64) -> Result<Self> {
        Ok(EvmClient::ReadOnly(
            EvmClientReadOnly::new(rpc_url, chain_id).await?,
        ))
    }

    pub async fn new_with_signer(rpc_url: &str, chain_id: u64, private_key: &str) -> Result<Self> {
        Ok(EvmClient::WithSigner(
            EvmClientWithSigner::new(rpc_url, chain_id, private_key).await?,
        ))
    }

    pub async fn get_block_number(&self) -> Result<u64> {
        match self {
            EvmClient::ReadOnly(c) => c.get_block_number().await,
            EvmClient::WithSigner(c) => c.get_block_number().await,
        }
    }

    pub async fn get_chain_id(&self) -> Result<u64> {
        match self {
            EvmClient::ReadOnly(c) => c.get_chain_id().await,
            EvmClient::WithSigner(c) => c.get_chain_id().await,
        }
    }

    pub fn has_signer(&self) -> bool {
        matches!(self, EvmClient::WithSigner(_))
    }

    pub fn get_signer_address(&self) -> Option<Address> {
        match self {
            EvmClient::ReadOnly(_) => None,
            EvmClient::WithSigner(c) => Some(c.signer_address),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_creation() {
        let config = EvmClientConfig {
            rpc_url: "http://localhost:8545".to_string(),
            chain_id: 31337,
            private_key: None,
        };

        assert_eq!(config.chain_id, 31337);
        assert!(config.private_key.is_none());
    }
}
