use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FlowError {
    #[error("transfer amount must be finite and non-negative, got {0}")]
    InvalidAmount(f64),

    #[error("tank '{label}' capacity must be finite and positive, got {capacity}")]
    InvalidCapacity { label: String, capacity: f64 },

    #[error("tank '{label}' quantity {quantity} is outside 0..={capacity}")]
    QuantityOutOfRange {
        label: String,
        quantity: f64,
        capacity: f64,
    },

    #[error("tank index {index} out of range (chain has {count} tanks)")]
    TankOutOfRange { index: usize, count: usize },

    #[error("invalid flow rules: {0}")]
    InvalidRules(&'static str),

    #[error("a flow chain needs at least two tanks, got {0}")]
    EmptyChain(usize),
}

pub type FlowResult<T> = Result<T, FlowError>;
