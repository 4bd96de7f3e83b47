pub mod character_development;
pub mod plot_consistency;

pub use character_development::CharacterDevelopmentProcessor;
pub use plot_consistency::PlotConsistencyProcessor;

use super::types::ContentProcessor;
use std::sync::Arc;

/// Processors registered by default.
pub fn reference_processors() -> Vec<Arc<dyn ContentProcessor>> {
    vec![
        Arc::new(PlotConsistencyProcessor::new()),
        Arc::new(CharacterDevelopmentProcessor::new()),
    ]
}
