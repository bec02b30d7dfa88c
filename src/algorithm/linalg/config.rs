//! Per-context decomposition settings

use super::status::StatusTable;
use crate::tensor::MemoryOrder;

/// Settings a client applies to every decomposition it runs
///
/// # Example
///
/// ```
/// use densolve::algorithm::linalg::{LinalgConfig, StatusClass, StatusTable};
/// use densolve::tensor::MemoryOrder;
///
/// let config = LinalgConfig::new()
///     .with_output_order(MemoryOrder::ColumnMajor)
///     .with_raw_outputs_f64(false)
///     .with_status_table(StatusTable::new().with_override(-7, StatusClass::ResourceExhausted));
/// assert_eq!(config.output_order(), MemoryOrder::ColumnMajor);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinalgConfig {
    status_table: StatusTable,
    raw_outputs_f64: bool,
    output_order: MemoryOrder,
}

impl Default for LinalgConfig {
    fn default() -> Self {
        Self {
            status_table: StatusTable::default(),
            raw_outputs_f64: true,
            output_order: MemoryOrder::RowMajor,
        }
    }
}

impl LinalgConfig {
    /// Default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the factorization status classification
    pub fn with_status_table(mut self, table: StatusTable) -> Self {
        self.status_table = table;
        self
    }

    /// Return QR raw-mode outputs as `f64` even when computed in `f32` (default `true`)
    pub fn with_raw_outputs_f64(mut self, enabled: bool) -> Self {
        self.raw_outputs_f64 = enabled;
        self
    }

    /// Element order of the output tensors (default row-major)
    pub fn with_output_order(mut self, order: MemoryOrder) -> Self {
        self.output_order = order;
        self
    }

    /// Factorization status classification
    #[inline]
    pub fn status_table(&self) -> &StatusTable {
        &self.status_table
    }

    /// Whether QR raw-mode outputs are upcast to `f64`
    #[inline]
    pub fn raw_outputs_f64(&self) -> bool {
        self.raw_outputs_f64
    }

    /// Element order of the output tensors
    #[inline]
    pub fn output_order(&self) -> MemoryOrder {
        self.output_order
    }
}
