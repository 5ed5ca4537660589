//! # fmd-client
//!
//! Client side of the FMD protocol: authenticates against an FMD server,
//! decrypts the location and photo records the device uploads, keeps a
//! polling schedule for fresh locations, and sends signed device commands
//! with a two-step interlock in front of the factory wipe.
//!
//! All payloads stay end-to-end encrypted; the server only ever sees
//! ciphertext and the login hash. Cryptography lives in [`fmd_crypto`].

#![forbid(unsafe_code)]

pub mod client;
pub mod commands;
pub mod config;
pub mod error;
pub mod infra;
pub mod location;
pub mod photos;
pub mod server;
pub mod session;
pub mod tracking;

pub use client::FmdClient;
pub use commands::{Ack, Camera, CommandGateway, CommandKind, InterlockStatus, RingerMode};
pub use config::{ClientConfig, GatewayConfig, TrackerConfig};
pub use error::{ClientError, Result};
pub use infra::{ArtifactStore, HttpServer};
pub use location::{LocationFilter, LocationRecord, LocationService, LocationSource};
pub use photos::{BlobRef, DecryptedPhoto, PhotoBatch, PhotoPipeline};
pub use server::{FmdServer, ServerError, SignedCommand};
pub use session::{AuthArtifacts, Credentials, Session, SessionAuthenticator, SessionState};
pub use tracking::{PollKind, PollOutcome, PollReport, PollingMode, PollingState, TrackingScheduler};
