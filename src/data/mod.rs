/// Data layer: core types, loading, and channel selection.
///
/// Architecture:
/// ```text
///  .mat / .csv / .parquet
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → Recording (matfile for .mat)
///   └──────────┘
///        │
///        ▼
///   ┌───────────┐
///   │ Recording  │  samples × variables matrix
///   └───────────┘
///        │
///        ▼
///   ┌──────────┐
///   │ channels  │  fixed column map → Vec<Channel>
///   └──────────┘
/// ```

pub mod channels;
pub mod loader;
pub mod matfile;
pub mod model;
