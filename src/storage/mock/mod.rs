//! Mock storage implementations for testing.

mod key_value;
mod time_series;

pub use key_value::MockKeyValueStore;
pub use time_series::MockTimeSeriesStore;
