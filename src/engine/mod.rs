pub mod training;

pub use training::TrainingPipeline;
