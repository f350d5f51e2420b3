//! Typed messages carried on peer streams.
//!
//! Every stream carries one message type. A message is turned into its wire
//! form with [`Message::wrap`] and then serialized with bincode; decoding runs
//! the other way and ends with [`Message::unwrap`]. Types whose wire form is
//! themselves implement [`PlainMessage`] and get `Message` for free.
use crate::Result;

use bincode::Options;
use serde::de::DeserializeOwned;
use serde::Serialize;

use std::borrow::Cow;
use std::fmt::Debug;

pub trait Message: Debug + Send + Sync + Sized + 'static {
    /// The type serialized on the wire for this message.
    type Wire: Serialize + DeserializeOwned + Clone;

    fn wrap(&self) -> Cow<'_, Self::Wire>;

    /// Fails when the wire value does not hold a message of this type.
    fn unwrap(wire: Self::Wire) -> Result<Self>;

    /// Label under which the bytes of this message are accounted.
    fn type_label(&self) -> String {
        type_label_of::<Self>()
    }
}

/// A message that goes on the wire as-is.
pub trait PlainMessage: Serialize + DeserializeOwned + Clone + Debug + Send + Sync + 'static {}

impl<T: PlainMessage> Message for T {
    type Wire = T;

    fn wrap(&self) -> Cow<'_, T> {
        Cow::Borrowed(self)
    }

    fn unwrap(wire: T) -> Result<T> {
        Ok(wire)
    }
}

/// Fixed-width integers, as `bincode::serialize` writes them. A frame holds exactly one
/// message, so bytes left over after decoding are an error.
fn wire_options() -> impl Options {
    bincode::DefaultOptions::new().with_fixint_encoding().reject_trailing_bytes()
}

pub fn encode<T: Message>(msg: &T) -> Result<Vec<u8>> {
    let wire = msg.wrap();
    Ok(wire_options().serialize(&*wire)?)
}

pub fn decode<T: Message>(bytes: &[u8]) -> Result<T> {
    let wire: T::Wire = wire_options().deserialize(bytes)?;
    T::unwrap(wire)
}

/// `module_Type` for a Rust type, e.g. `consensus_NewRoundStep`.
pub fn type_label_of<T: ?Sized>() -> String {
    let name = std::any::type_name::<T>();
    let path = name.split('<').next().unwrap_or(name);
    let mut segments = path.rsplit("::");
    match (segments.next(), segments.next()) {
        (Some(ty), Some(module)) => format!("{}_{}", module, ty),
        (Some(ty), None) => ty.to_owned(),
        _ => name.to_owned(),
    }
}
