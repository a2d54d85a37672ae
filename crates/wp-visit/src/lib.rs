//! Visit descriptors: options, normalization, payload encoding, fingerprints and the page model.

pub mod builder;
pub mod callbacks;
pub mod fingerprint;
pub mod headers;
pub mod method;
pub mod options;
pub mod page;
pub mod payload;
pub mod pending;
pub mod target;

pub use builder::VisitBuilder;
pub use callbacks::CancelToken;
pub use callbacks::RequestProgress;
pub use callbacks::VisitCallbacks;
pub use callbacks::VisitFailure;
pub use fingerprint::RequestFingerprint;
pub use headers::Header;
pub use method::VisitMethod;
pub use options::ReloadOptions;
pub use options::VisitOptions;
pub use page::Page;
pub use page::TOP_FRAME;
pub use page::VisitResponse;
pub use payload::QueryStringArrayFormat;
pub use payload::RequestPayload;
pub use payload::VisitBody;
pub use pending::ActiveVisit;
pub use pending::PendingVisit;
pub use pending::Termination;
pub use pending::VisitId;
pub use target::VisitTarget;
