//! # Dashboard Module
//!
//! The widget-state engine: widgets, the canvas that owns them, and the
//! layout files that persist them.
//!
//! ## Why This Module Exists
//!
//! A dashboard widget has three masters. Broker messages arrive
//! asynchronously and change its value, the user drags, resizes and edits
//! it, and a layout file has to describe it well enough to rebuild the
//! exact same set later. This module keeps those three in agreement without
//! feedback loops (a slider echoing its own topic) and without duplicate
//! broker traffic (three gauges on one topic still mean one subscription).
//!
//! ## Module Architecture
//!
//! ```text
//! dashboard/
//! ├── config.rs       - Open key/value widget configuration
//! ├── geometry.rs     - Rectangles, grid snapping, resize edges
//! ├── interaction.rs  - Drag/resize gesture state machine
//! ├── kinds.rs        - Widget kinds and per-kind behaviour
//! ├── widget.rs       - The widget model
//! ├── registry.rs     - Kind lookup and widget construction
//! ├── canvas.rs       - Widget arena, subscriptions, message routing
//! ├── layout.rs       - JSON layout documents
//! └── error.rs        - Error types
//! ```
//!
//! ## Data Flow
//!
//! ```text
//! Transport ──TransportEvent──► Canvas::handle_event ──► Widget::on_message (no publish)
//! UI edit ──► Canvas::user_edit ──► Widget::on_user_edit ──► Transport::publish
//! Canvas ◄──► LayoutDocument ◄──► layout.json
//! ```
//!
//! Everything here runs on the UI thread; the canvas is the single owner of
//! all widget state, so nothing needs locking.

pub mod canvas;
pub mod config;
pub mod error;
pub mod geometry;
pub mod interaction;
pub mod kinds;
pub mod layout;
pub mod registry;
pub mod widget;

pub use canvas::{Canvas, WidgetId};
pub use config::{keys, WidgetConfig};
pub use error::{DashboardError, LayoutError};
pub use geometry::{Geometry, ResizeDirection, Size, GRID_SIZE};
pub use kinds::WidgetKind;
pub use layout::{LayoutDocument, RestoreReport};
pub use registry::{WidgetRegistry, WidgetSpec};
pub use widget::{Appearance, UserEdit, WarningLevel, Widget, WidgetValue};
