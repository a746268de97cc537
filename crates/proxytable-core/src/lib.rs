pub mod assemble;
pub mod block;
pub mod cache;
pub mod config;
pub mod dimensions;
pub mod error;
pub mod layout;
pub mod model;
pub mod provider;
pub mod scheduler;
pub mod table;
pub mod viewport;

pub use assemble::{Assembly, Cell, Column, Row};
pub use block::{BlockMapper, BlockWindow};
pub use config::{AppConfig, SourceKind};
pub use dimensions::Dimensions;
pub use error::{Error, Result};
pub use layout::{layout_fn, Layout};
pub use model::{ColumnInfo, Configuration, Query, RowInfo, Slice};
pub use provider::DataProvider;
pub use scheduler::{TableEvent, TableHandle, TableService};
pub use table::{Table, TableSettings};
