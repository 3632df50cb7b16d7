//! Capability-typed ports to the external collaborators: the media control
//! plane (live inputs/channels, packager, CDN distribution), the VOD object
//! store, the password-email worker and the payment gateway.

pub mod gateway;
pub mod mailer;
pub mod media_control;
pub mod object_storage;

pub use gateway::{
    verify_webhook_signature, CheckoutSession, CheckoutSessionRequest, PaymentGateway,
    PaymentIntentDetails, StripeGateway,
};
pub use mailer::{HttpPasswordMailer, PasswordMailer};
pub use media_control::{
    ChannelState, Distribution, HttpMediaControl, LiveInput, MediaControl, MediaError,
    MediaResult, PackagerEndpoint,
};
pub use object_storage::{ObjectStorage, S3ObjectStorage};
