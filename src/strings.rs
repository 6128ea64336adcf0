//! User-facing texts carried by notifications.
//!
//! Placeholders in braces (`{time}`, `{docs}` ...) are substituted by the
//! handler that raises the notification.

pub const PRODUCT_NAME: &str = "Collabora Online Development Edition (unbranded)";
pub const PRODUCT_URL: &str = "https://collaboraonline.github.io/";

pub const CONNECT_FAILED: &str = "Oops, there is a problem connecting to {productname}: ";
pub const RECONNECTING: &str = "Reconnecting...";
pub const CONNECTING: &str = "Connecting...";
pub const SERVER_DISCONNECTED: &str = "The server has been disconnected.";
pub const CANNOT_CONNECT: &str =
    "Well, this is embarrassing, we cannot connect to your document. Please try again.";
pub const SERVER_REACHABLE: &str = "Server is now reachable. We have to refresh the page now.";
pub const SERVER_SHUTTING_DOWN: &str = "Server is shutting down";
pub const UNSUPPORTED_SERVER: &str = "Unsupported server version.";
pub const WRONG_SERVER: &str = "Wrong server, reconnecting...";
pub const CLUSTER_CONFIGURATION: &str = "Your {productname} cluster configuration is broken: \
     expected server {0} for route token {1} but reached {2}.";
pub const MIGRATING: &str = "Document is getting migrated";

pub const SESSION_EXPIRY: &str = "Your session will expire at {time}. Please save your work and refresh.";
pub const SESSION_EXPIRED: &str = "Your session has expired. Further changes may not be saved.";

pub const PASSWORD_TO_VIEW: &str = "Document requires password to view.";
pub const PASSWORD_TO_MODIFY: &str =
    "Document requires password to modify. Hit Cancel to open in view-only mode.";
pub const WRONG_PASSWORD: &str = "Wrong password provided. Please try again.";
pub const CANT_CHANGE_PASSWORD: &str = "Only the document owner can change the password.";

pub const DISK_FULL: &str = "No disk space left on server, please contact the server administrator to continue.";
pub const INTERNAL_ERROR: &str = "An internal error occurred on the server.";
pub const UNAUTHORIZED: &str = "Unauthorized WOPI host. Please try again later and report to your administrator if the issue persists.";
pub const VERIFICATION_ERROR: &str = "Certificate verification failed: {errormessage}";
pub const FAILED_DOC_LOADING: &str = "Failed to load the document. Please ensure the file type is supported and not corrupted, and try again.";
pub const DOC_LOAD_TIMEOUT: &str = "Failed to load the document. This document is either malformed or is taking more resources than allowed. Please contact the administrator.";
pub const DOC_UNLOADING_RETRY: &str = "Cleaning up the document, please wait...";
pub const DOC_UNLOADING_GIVE_UP: &str = "The document could not be closed on the server. Please reload.";
pub const LIMIT_REACHED: &str = "This is an unsupported version of {productname}. To avoid the impression that it is suitable for deployment in enterprises, this message appears when more than {docs} documents or {connections} connections are in use concurrently";
pub const LIMIT_REACHED_PROD: &str = "This service is limited to {0} documents, and {1} connections total by the admin. This limit has been reached. Please try again later.";
pub const SERVICE_UNAVAILABLE: &str = "Service is unavailable. Please try again later and report to your administrator if the issue persists.";
pub const SOCKET_GENERIC_FAILURE: &str = "Failed to establish socket connection or socket connection closed unexpectedly.";
pub const SOCKET_PROXY_FAILURE: &str = "Failed to establish socket connection or socket connection closed unexpectedly. The reverse proxy might be misconfigured, please contact the administrator.";

pub const STORAGE_SAVE_DISK_FULL: &str = "Save failed due to no disk space left on storage server. Document will now be read-only. Please contact the server administrator to continue editing.";
pub const STORAGE_SAVE_TOO_LARGE: &str = "The document is too large or there is insufficient space left on the storage server to save the document.";
pub const STORAGE_SAVE_FAILED: &str = "Document cannot be saved. Check your permissions or contact the storage server administrator.";
pub const STORAGE_RENAME_FAILED: &str = "Document cannot be renamed. Check your permissions or contact the storage server administrator.";
pub const STORAGE_SAVE_UNAUTHORIZED: &str = "Document cannot be saved due to expired or invalid access token.";
pub const STORAGE_SAVE_AS_FAILED: &str = "Document cannot be saved as the new name. Check your permissions or contact the storage server administrator.";
pub const STORAGE_LOAD_FAILED: &str = "Failed to read document from storage, please contact your storage server (%storageserver) administrator.";

pub const BLOCK_RENAME: &str = "The document is being renamed and will reload shortly";
pub const BLOCK_OFFLINE: &str = "The document is switching to Offline mode and will reload shortly";
pub const MISSING_FONTS: &str = "Missing Fonts";
pub const EXPORTED_TITLE: &str = "Exported to storage";
pub const EXPORTED: &str = "Successfully exported: ";
pub const SOMEONE: &str = "Someone";
pub const CLOSE_DIALOG: &str = "Close";

/// `template` with `{productname}` filled in.
#[must_use]
pub fn branded(template: &str) -> String { template.replace("{productname}", PRODUCT_NAME) }
