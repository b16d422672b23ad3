pub mod hazard_processor;
