//! # Luke Core
//!
//! Canvas model shared by the Luke control bridge and its controllers.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                  luke-core                  │
//! ├─────────────────────────────────────────────┤
//! │  Element         │  ElementStore            │
//! │  - Circle        │  - id index              │
//! │  - Rectangle     │  - insertion order       │
//! │  - Text          │  - atomic reload         │
//! ├─────────────────────────────────────────────┤
//! │  Document codec  │  Discovery file          │
//! │  - never fails   │  - port hand-off         │
//! ├─────────────────────────────────────────────┤
//! │  Controller wire protocol                   │
//! └─────────────────────────────────────────────┘
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod codec;
pub mod discovery;
pub mod document;
pub mod element;
pub mod error;
pub mod protocol;
pub mod store;

pub use discovery::{default_discovery_path, DiscoveryError, DISCOVERY_FILE_NAME};
pub use document::Document;
pub use element::{
    Circle, Element, ElementId, ElementKind, Rectangle, Text, DEFAULT_COLOR, DEFAULT_FONT_SIZE,
};
pub use error::{CoreError, CoreResult};
pub use protocol::{ControlRequest, ControlResponse};
pub use store::ElementStore;

/// Luke core version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
