mod client;
mod oauth;

pub use client::{
    ApiErrorClass, DiskClient, DiskError, OperationStatus, Resource, ResourceList, ResourceType,
    TransferLink,
};
pub use oauth::{OAuthClient, OAuthError, OAuthToken};
