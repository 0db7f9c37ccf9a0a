//! Translation unit for the version pair where text components moved from
//! JSON strings to tag trees. The server side still writes components as
//! length-prefixed JSON; the client side expects them as network tags, so
//! every clientbound packet carrying a component is rewritten field by field.

use crate::component;
use crate::pipeline::{FieldKind, Pipeline, Translation};
use crate::registry::{EntityTaxonomy, EntityTracker, TranslationRegistry};
use crate::types::{
    Boolean, Byte, Float, Int, JsonText, Long, NetworkTag, Optional, ProfileKeyType,
    SignatureBytes, Slot, UnsignedByte, VarInt, VarIntArray, WireString, WireUuid,
};
use conduit_common::{ConnectionState, TranslateError};
use conduit_nbt::Tag;
use std::sync::Arc;

/// Entity-kind table in effect for connections translated by this unit.
pub const PLAYER_TAXONOMY: EntityTaxonomy = EntityTaxonomy {
    protocol_version: 762,
};

/// Clientbound play packets of this pair that carry text components. Ids are
/// shared by both versions of the pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientboundPlay {
    CommandSuggestions = 0x10,
    Disconnect = 0x1B,
    DisguisedChat = 0x1C,
    MapData = 0x29,
    OpenScreen = 0x31,
    PlayerChat = 0x37,
    CombatKill = 0x3A,
    PlayerInfoUpdate = 0x3C,
    StartConfiguration = 0x41,
    ResourcePack = 0x42,
    ServerData = 0x47,
    ActionBar = 0x48,
    ScoreboardObjective = 0x54,
    Teams = 0x58,
    SetSubtitle = 0x5D,
    SetTitle = 0x5F,
    SystemChat = 0x67,
    TabList = 0x68,
    UpdateAdvancements = 0x6E,
}

impl ClientboundPlay {
    pub const fn id(self) -> i32 {
        self as i32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientboundConfiguration {
    PluginMessage = 0x00,
    Disconnect = 0x01,
    FinishConfiguration = 0x02,
    KeepAlive = 0x03,
    Ping = 0x04,
    RegistryData = 0x05,
    ResourcePack = 0x06,
    UpdateTags = 0x07,
}

impl ClientboundConfiguration {
    pub const fn id(self) -> i32 {
        self as i32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerboundConfiguration {
    ClientInformation = 0x00,
    PluginMessage = 0x01,
    FinishConfiguration = 0x02,
    KeepAlive = 0x03,
    Pong = 0x04,
    ResourcePackStatus = 0x05,
}

impl ServerboundConfiguration {
    pub const fn id(self) -> i32 {
        self as i32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerboundLogin {
    LoginStart = 0x00,
    EncryptionResponse = 0x01,
    PluginResponse = 0x02,
    LoginAcknowledged = 0x03,
}

impl ServerboundLogin {
    pub const fn id(self) -> i32 {
        self as i32
    }
}

/// Populates `registry` with this pair's packet mappings, state sentinels and
/// the entity hook fired on entry into play.
pub fn register(registry: &mut TranslationRegistry, entity_tracker: Arc<dyn EntityTracker>) {
    registry.set_login_acknowledged(ServerboundLogin::LoginAcknowledged.id());
    registry.set_finish_configuration(ServerboundConfiguration::FinishConfiguration.id());
    registry.set_start_configuration(ClientboundPlay::StartConfiguration.id());
    registry.set_entity_tracker(entity_tracker, PLAYER_TAXONOMY);

    register_play(registry, ClientboundPlay::UpdateAdvancements, advancements());
    register_play(registry, ClientboundPlay::CommandSuggestions, command_suggestions());
    register_play(registry, ClientboundPlay::MapData, map_data());
    register_play(registry, ClientboundPlay::PlayerChat, player_chat());
    register_play(
        registry,
        ClientboundPlay::ScoreboardObjective,
        scoreboard_objective(),
    );
    register_play(registry, ClientboundPlay::Teams, teams());

    register_play(
        registry,
        ClientboundPlay::Disconnect,
        Pipeline::new().handler(convert_component),
    );
    register_play(registry, ClientboundPlay::ResourcePack, resource_pack());
    register_play(
        registry,
        ClientboundPlay::ServerData,
        Pipeline::new().handler(convert_component),
    );
    register_play(
        registry,
        ClientboundPlay::ActionBar,
        Pipeline::new().handler(convert_component),
    );
    register_play(
        registry,
        ClientboundPlay::SetTitle,
        Pipeline::new().handler(convert_component),
    );
    register_play(
        registry,
        ClientboundPlay::SetSubtitle,
        Pipeline::new().handler(convert_component),
    );
    register_play(
        registry,
        ClientboundPlay::DisguisedChat,
        Pipeline::new().handler(convert_component),
    );
    register_play(
        registry,
        ClientboundPlay::SystemChat,
        Pipeline::new().handler(convert_component),
    );

    // Declarative copies followed by a component rewrite.
    register_play(
        registry,
        ClientboundPlay::OpenScreen,
        Pipeline::new()
            .copy(FieldKind::VarInt) // Window id
            .copy(FieldKind::VarInt) // Window type
            .handler(convert_component),
    );
    register_play(
        registry,
        ClientboundPlay::TabList,
        Pipeline::new().handler(convert_component).handler(convert_component),
    );
    register_play(
        registry,
        ClientboundPlay::CombatKill,
        Pipeline::new()
            .copy(FieldKind::VarInt) // Duration
            .handler(convert_component),
    );
    register_play(
        registry,
        ClientboundPlay::PlayerInfoUpdate,
        player_info_update(),
    );

    // The configuration state has its own id namespace.
    registry.register_clientbound(
        ConnectionState::Configuration,
        ClientboundConfiguration::Disconnect.id(),
        ClientboundConfiguration::Disconnect.id(),
        Pipeline::new().handler(convert_component),
    );
    registry.register_clientbound(
        ConnectionState::Configuration,
        ClientboundConfiguration::ResourcePack.id(),
        ClientboundConfiguration::ResourcePack.id(),
        resource_pack(),
    );
}

fn register_play(registry: &mut TranslationRegistry, packet: ClientboundPlay, pipeline: Pipeline) {
    registry.register_clientbound(ConnectionState::Play, packet.id(), packet.id(), pipeline);
}

/// Reads a JSON component and writes it as a network tag.
fn convert_component(tr: &mut Translation<'_>) -> Result<(), TranslateError> {
    let component = tr.read(JsonText)?;
    let tag = component::text_to_tag(Some(&component), tr.diagnostics()).unwrap_or(Tag::End);
    tr.write(NetworkTag, &tag)
}

/// Bool-prefixed variant of [`convert_component`].
fn convert_optional_component(tr: &mut Translation<'_>) -> Result<(), TranslateError> {
    let component = tr.read(Optional(JsonText))?;
    let tag = component::text_to_tag(component.as_ref(), tr.diagnostics());
    tr.write(Optional(NetworkTag), &tag)
}

fn advancements() -> Pipeline {
    Pipeline::new().handler(|tr| {
        tr.passthrough(Boolean)?; // Reset/clear
        let size = tr.passthrough(VarInt)?; // Mapping size
        for _ in 0..size {
            tr.passthrough(WireString)?; // Identifier

            // Parent
            if tr.passthrough(Boolean)? {
                tr.passthrough(WireString)?;
            }

            // Display data
            if tr.passthrough(Boolean)? {
                convert_component(tr)?; // Title
                convert_component(tr)?; // Description
                tr.passthrough(Slot)?; // Icon
                tr.passthrough(VarInt)?; // Frame type
                let flags = tr.passthrough(Int)?;
                if (flags & 1) != 0 {
                    tr.passthrough(WireString)?; // Background texture
                }
                tr.passthrough(Float)?; // X
                tr.passthrough(Float)?; // Y
            }

            let requirements = tr.passthrough(VarInt)?;
            for _ in 0..requirements {
                tr.passthrough(VarIntArray(WireString))?;
            }

            tr.passthrough(Boolean)?; // Send telemetry
        }
        Ok(())
    })
}

fn command_suggestions() -> Pipeline {
    Pipeline::new().handler(|tr| {
        tr.passthrough(VarInt)?; // Transaction id
        tr.passthrough(VarInt)?; // Start
        tr.passthrough(VarInt)?; // Length

        let suggestions = tr.passthrough(VarInt)?;
        for _ in 0..suggestions {
            tr.passthrough(WireString)?; // Suggestion
            convert_optional_component(tr)?; // Tooltip
        }
        Ok(())
    })
}

fn map_data() -> Pipeline {
    Pipeline::new().handler(|tr| {
        tr.passthrough(VarInt)?; // Map id
        tr.passthrough(Byte)?; // Scale
        tr.passthrough(Boolean)?; // Locked
        if tr.passthrough(Boolean)? {
            let icons = tr.passthrough(VarInt)?;
            for _ in 0..icons {
                tr.passthrough(Byte)?; // Type
                tr.passthrough(Byte)?; // X
                tr.passthrough(Byte)?; // Y
                tr.passthrough(Byte)?; // Rotation
                convert_optional_component(tr)?; // Display name
            }
        }
        Ok(())
    })
}

fn player_chat() -> Pipeline {
    Pipeline::new().handler(|tr| {
        tr.passthrough(WireUuid)?; // Sender
        tr.passthrough(VarInt)?; // Index
        tr.passthrough(Optional(SignatureBytes))?; // Signature
        tr.passthrough(WireString)?; // Plain content
        tr.passthrough(Long)?; // Timestamp
        tr.passthrough(Long)?; // Salt

        let last_seen = tr.passthrough(VarInt)?;
        for _ in 0..last_seen {
            let index = tr.passthrough(VarInt)?;
            if index == 0 {
                tr.passthrough(SignatureBytes)?;
            }
        }

        convert_optional_component(tr)?; // Unsigned content

        let filter_mask_type = tr.passthrough(VarInt)?;
        if filter_mask_type == 2 {
            tr.passthrough(VarIntArray(Long))?; // Mask
        }

        tr.passthrough(VarInt)?; // Chat type
        convert_component(tr)?; // Sender name
        convert_optional_component(tr)?; // Target
        Ok(())
    })
}

fn scoreboard_objective() -> Pipeline {
    Pipeline::new().handler(|tr| {
        tr.passthrough(WireString)?; // Objective name
        let action = tr.passthrough(Byte)?; // Mode
        if action == 0 || action == 2 {
            convert_component(tr)?; // Display name
        }
        Ok(())
    })
}

fn teams() -> Pipeline {
    Pipeline::new().handler(|tr| {
        tr.passthrough(WireString)?; // Team name
        let action = tr.passthrough(Byte)?; // Mode
        if action == 0 || action == 2 {
            convert_component(tr)?; // Display name
            tr.passthrough(Byte)?; // Flags
            tr.passthrough(WireString)?; // Name tag visibility
            tr.passthrough(WireString)?; // Collision rule
            tr.passthrough(VarInt)?; // Color
            convert_component(tr)?; // Prefix
            convert_component(tr)?; // Suffix
        }
        Ok(())
    })
}

fn resource_pack() -> Pipeline {
    Pipeline::new().handler(|tr| {
        tr.passthrough(WireString)?; // Url
        tr.passthrough(WireString)?; // Hash
        tr.passthrough(Boolean)?; // Required
        convert_optional_component(tr)
    })
}

fn player_info_update() -> Pipeline {
    Pipeline::new().handler(|tr| {
        let actions = tr.passthrough(UnsignedByte)?; // Action bitset
        let entries = tr.passthrough(VarInt)?;
        for _ in 0..entries {
            tr.passthrough(WireUuid)?;
            if actions & (1 << 0) != 0 {
                tr.passthrough(WireString)?; // Player name

                let properties = tr.passthrough(VarInt)?;
                for _ in 0..properties {
                    tr.passthrough(WireString)?; // Name
                    tr.passthrough(WireString)?; // Value
                    tr.passthrough(Optional(WireString))?; // Signature
                }
            }
            if actions & (1 << 1) != 0 && tr.passthrough(Boolean)? {
                tr.passthrough(WireUuid)?; // Session id
                tr.passthrough(ProfileKeyType)?;
            }
            if actions & (1 << 2) != 0 {
                tr.passthrough(VarInt)?; // Gamemode
            }
            if actions & (1 << 3) != 0 {
                tr.passthrough(Boolean)?; // Listed
            }
            if actions & (1 << 4) != 0 {
                tr.passthrough(VarInt)?; // Latency
            }
            if actions & (1 << 5) != 0 {
                convert_optional_component(tr)?; // Display name
            }
        }
        Ok(())
    })
}
