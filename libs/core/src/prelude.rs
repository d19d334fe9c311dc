pub use crate::backend::Backend;
pub use crate::channel::{
    CONFIG_ACCOUNT_SID, CONFIG_AUTH_TOKEN, CONFIG_IGNORE_DELIVERY_REPORTS,
    CONFIG_MESSAGING_SERVICE_SID, CONFIG_SEND_URL, Channel, ChannelType,
};
pub use crate::error::HandlerError;
pub use crate::http::{
    Exchange, HttpClient, RawRequest, RawResponse, ReqwestClient, TransportError,
    execute_recorded,
};
pub use crate::ids::{MsgId, MsgUuid};
pub use crate::log::ChannelLog;
pub use crate::msg::{Attachment, Msg, UrlButton};
pub use crate::status::{MsgStatus, StatusUpdate};
pub use crate::urn::{Urn, UrnError, UrnScheme};
