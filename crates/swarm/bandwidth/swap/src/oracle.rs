use alloy_primitives::U256;
use async_trait::async_trait;
use vertex_swarm_net_swap::SettlementHeaders;

#[derive(Debug, thiserror::Error)]
#[error("price oracle: {0}")]
pub struct OracleError(pub String);

/// Source of the exchange rate and deduction advertised to peers.
#[async_trait]
pub trait PriceOracle: Send + Sync {
    async fn current_rates(&self) -> Result<SettlementHeaders, OracleError>;
}

/// Oracle returning the same rates forever.
#[derive(Debug, Clone, Copy)]
pub struct FixedPriceOracle {
    rates: SettlementHeaders,
}

impl FixedPriceOracle {
    pub const fn new(exchange_rate: U256, deduction: U256) -> Self {
        Self {
            rates: SettlementHeaders::new(exchange_rate, deduction),
        }
    }
}

#[async_trait]
impl PriceOracle for FixedPriceOracle {
    async fn current_rates(&self) -> Result<SettlementHeaders, OracleError> {
        Ok(self.rates)
    }
}
