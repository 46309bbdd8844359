pub mod backtest;
pub mod calibration;
pub mod classifier;
pub mod competition;
pub mod config;
pub mod dataset;
pub mod elo;
pub mod evaluate;
pub mod features;
pub mod form;
pub mod h2h;
pub mod predict;
pub mod quality;
pub mod rankings;
pub mod simulation;
pub mod squad;
pub mod team_names;
pub mod travel;
