mod media;
mod participant;
mod room;
mod signaling;

pub use media::MediaKind;
pub use participant::ParticipantId;
pub use room::{RoomId, DEFAULT_ROOM};
pub use signaling::{
    ClientMessage, ConsumerCreated, KilledData, NicknameData, ProducerAnnouncement,
    ProducerCreated, ServerMessage, TransportOptions, WelcomeData,
};
