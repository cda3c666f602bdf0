// vesta-api: Async HTTP transport for the Vesta/Climax panel local API

pub mod endpoints;
pub mod error;
pub mod models;
pub mod transport;

mod client;

pub use client::{PanelClient, panel_base_url};
pub use endpoints::PanelApi;
pub use error::Error;
pub use transport::{Form, Method, PanelTransport, TransportConfig};
