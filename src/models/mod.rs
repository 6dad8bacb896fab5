pub mod run;
pub mod suggestion;
pub mod training;
pub mod weather;

pub use run::{AcceptedRun, LastCompletedRun, ProgressionStats, RunType, RunTypePreference};
pub use suggestion::Suggestion;
pub use training::TrainingWeek;
pub use weather::{CacheEntry, WeatherCondition, WeatherDay};
