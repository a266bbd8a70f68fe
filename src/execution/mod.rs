// Market data buffering, order sizing and position tracking
pub mod candle_buffer;
pub mod position_manager;
pub mod sizer;

pub use candle_buffer::{BarMode, CandleBuffer, IngestStats};
pub use position_manager::{
    pnl_percent, ExitReason, ExitSignal, Position, PositionManager, PositionState, RiskThresholds,
};
pub use sizer::PositionSizer;
