//! [`PeerConnection`] backed by the `webrtc` crate.
//!
//! Negotiates a single receive-only H.264 video transceiver.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, trace};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::{MIME_TYPE_H264, MediaEngine};
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::media::io::sample_builder::SampleBuilder;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp::codecs::h264::H264Packet;
use webrtc::rtp_transceiver::RTCRtpTransceiverInit;
use webrtc::rtp_transceiver::rtp_codec::{RTCRtpCodecCapability, RTCRtpCodecParameters, RTPCodecType};
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;
use webrtc::track::track_remote::TrackRemote;

use crate::error::Result;
use crate::protocol::IceCandidate;

use super::peer::{MediaSample, PeerConnection, PeerEvent, PeerEventSender, PeerFactory, PeerState, RemoteTrack};

// ============================================================================
// Constants
// ============================================================================

/// RTP clock rate for video.
const VIDEO_CLOCK_RATE: u32 = 90_000;

/// Constrained baseline, packetization mode 1.
const H264_FMTP: &str = "level-asymmetry-allowed=1;packetization-mode=1;profile-level-id=42e01f";

/// Dynamic payload type offered for H.264.
const H264_PAYLOAD_TYPE: u8 = 102;

/// Packets the sample builder waits for before giving up on a gap.
const MAX_LATE_PACKETS: u16 = 512;

// ============================================================================
// RtcPeerFactory
// ============================================================================

/// Creates receive-only H.264 peers.
#[derive(Debug, Default, Clone, Copy)]
pub struct RtcPeerFactory;

impl RtcPeerFactory {
    /// Creates a factory.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn media_engine() -> Result<MediaEngine> {
        let mut media = MediaEngine::default();
        media.register_codec(
            RTCRtpCodecParameters {
                capability: RTCRtpCodecCapability {
                    mime_type: MIME_TYPE_H264.to_owned(),
                    clock_rate: VIDEO_CLOCK_RATE,
                    channels: 0,
                    sdp_fmtp_line: H264_FMTP.to_owned(),
                    rtcp_feedback: vec![],
                },
                payload_type: H264_PAYLOAD_TYPE,
                ..Default::default()
            },
            RTPCodecType::Video,
        )?;
        Ok(media)
    }

    fn install_handlers(pc: &RTCPeerConnection, events: &PeerEventSender) {
        let tx = events.clone();
        pc.on_ice_candidate(Box::new(move |candidate: Option<RTCIceCandidate>| {
            if let Some(candidate) = candidate {
                match candidate.to_json() {
                    Ok(init) => {
                        let _ = tx.send(PeerEvent::LocalCandidate(from_init(init)));
                    }
                    Err(e) => debug!(error = %e, "Skipping unserializable local candidate"),
                }
            }
            Box::pin(async {})
        }));

        let tx = events.clone();
        pc.on_track(Box::new(move |track: Arc<TrackRemote>, _receiver, _transceiver| {
            if track.kind() == RTPCodecType::Video {
                debug!(codec = %track.codec().capability.mime_type, "Remote video track");
                let _ = tx.send(PeerEvent::Track(Box::new(RtcTrack::new(track))));
            }
            Box::pin(async {})
        }));

        let tx = events.clone();
        pc.on_peer_connection_state_change(Box::new(move |state: RTCPeerConnectionState| {
            let _ = tx.send(PeerEvent::StateChanged(map_state(state)));
            Box::pin(async {})
        }));
    }
}

#[async_trait]
impl PeerFactory for RtcPeerFactory {
    async fn create(&self, ice_servers: &[String], events: PeerEventSender) -> Result<Arc<dyn PeerConnection>> {
        let mut media = Self::media_engine()?;
        let registry = register_default_interceptors(Registry::new(), &mut media)?;

        let api = APIBuilder::new()
            .with_media_engine(media)
            .with_interceptor_registry(registry)
            .build();

        let ice_servers_config = if ice_servers.is_empty() {
            vec![]
        } else {
            vec![RTCIceServer {
                urls: ice_servers.to_vec(),
                ..Default::default()
            }]
        };
        let config = RTCConfiguration {
            ice_servers: ice_servers_config,
            ..Default::default()
        };

        let pc = api.new_peer_connection(config).await?;
        pc.add_transceiver_from_kind(
            RTPCodecType::Video,
            Some(RTCRtpTransceiverInit {
                direction: RTCRtpTransceiverDirection::Recvonly,
                send_encodings: vec![],
            }),
        )
        .await?;

        Self::install_handlers(&pc, &events);
        debug!(servers = ice_servers.len(), "Peer connection created");

        Ok(Arc::new(RtcPeer { pc }))
    }
}

// ============================================================================
// RtcPeer
// ============================================================================

struct RtcPeer {
    pc: RTCPeerConnection,
}

#[async_trait]
impl PeerConnection for RtcPeer {
    async fn create_offer(&self) -> Result<String> {
        let offer = self.pc.create_offer(None).await?;
        let sdp = offer.sdp.clone();
        self.pc.set_local_description(offer).await?;
        Ok(sdp)
    }

    async fn apply_answer(&self, sdp: &str) -> Result<()> {
        let answer = RTCSessionDescription::answer(sdp.to_owned())?;
        self.pc.set_remote_description(answer).await?;
        Ok(())
    }

    async fn add_remote_candidate(&self, candidate: IceCandidate) -> Result<()> {
        self.pc.add_ice_candidate(into_init(candidate)).await?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.pc.close().await?;
        Ok(())
    }
}

// ============================================================================
// RtcTrack
// ============================================================================

struct RtcTrack {
    track: Arc<TrackRemote>,
    builder: SampleBuilder<H264Packet>,
}

impl RtcTrack {
    fn new(track: Arc<TrackRemote>) -> Self {
        Self {
            track,
            builder: SampleBuilder::new(MAX_LATE_PACKETS, H264Packet::default(), VIDEO_CLOCK_RATE),
        }
    }
}

#[async_trait]
impl RemoteTrack for RtcTrack {
    async fn next_sample(&mut self) -> Option<MediaSample> {
        loop {
            if let Some(sample) = self.builder.pop() {
                return Some(MediaSample { data: sample.data });
            }

            match self.track.read_rtp().await {
                Ok((packet, _)) => {
                    trace!(seq = packet.header.sequence_number, "RTP packet");
                    self.builder.push(packet);
                }
                Err(e) => {
                    debug!(error = %e, "Remote track read ended");
                    return None;
                }
            }
        }
    }
}

// ============================================================================
// Conversions
// ============================================================================

fn map_state(state: RTCPeerConnectionState) -> PeerState {
    match state {
        RTCPeerConnectionState::Connecting => PeerState::Connecting,
        RTCPeerConnectionState::Connected => PeerState::Connected,
        RTCPeerConnectionState::Disconnected => PeerState::Disconnected,
        RTCPeerConnectionState::Failed => PeerState::Failed,
        RTCPeerConnectionState::Closed => PeerState::Closed,
        _ => PeerState::New,
    }
}

fn from_init(init: RTCIceCandidateInit) -> IceCandidate {
    IceCandidate {
        candidate: init.candidate,
        sdp_mid: init.sdp_mid,
        sdp_mline_index: init.sdp_mline_index,
        username_fragment: init.username_fragment,
    }
}

fn into_init(candidate: IceCandidate) -> RTCIceCandidateInit {
    RTCIceCandidateInit {
        candidate: candidate.candidate,
        sdp_mid: candidate.sdp_mid,
        sdp_mline_index: candidate.sdp_mline_index,
        username_fragment: candidate.username_fragment,
    }
}

// ============================================================================
// Tests
// ============================================================================
