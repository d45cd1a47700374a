//! Driver configuration.

/// Environment variable that forces full recomputation on every pass.
pub const FULL_EVAL_ENV: &str = "FORMCELL_FULL_EVAL";

/// Tunables for [`CellLayout`](crate::CellLayout).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutConfig {
    /// Recompute every coordinate on each [`evaluate`](crate::CellLayout::evaluate)
    /// instead of only the dirty closure.
    pub force_full: bool,
    /// Tares given to a cell created without a parent, as `(x, y)`.
    pub root_origin: (f32, f32),
    /// Arena slots to reserve up front.
    pub cell_capacity: usize,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            force_full: false,
            root_origin: (0.0, 0.0),
            cell_capacity: 0,
        }
    }
}

impl LayoutConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults, with `force_full` taken from `FORMCELL_FULL_EVAL`.
    ///
    /// `"1"`, `"true"` and `"yes"` (any case) enable it; anything else,
    /// including an unset variable, leaves it off.
    #[must_use]
    pub fn from_env() -> Self {
        let force_full = std::env::var(FULL_EVAL_ENV)
            .map(|v| parse_flag(&v))
            .unwrap_or(false);
        Self {
            force_full,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn force_full(mut self, force_full: bool) -> Self {
        self.force_full = force_full;
        self
    }

    #[must_use]
    pub fn root_origin(mut self, x: f32, y: f32) -> Self {
        self.root_origin = (x, y);
        self
    }

    #[must_use]
    pub fn cell_capacity(mut self, capacity: usize) -> Self {
        self.cell_capacity = capacity;
        self
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes"
    )
}
