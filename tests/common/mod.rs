#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

use mixclient::domain::{Account, Entry, EntryKey, EntryRef, EntryState, EntryStatus, Pool};
use mixclient::error::{ChannelError, MixError, ParticipantError, ProtocolError, Result};
use mixclient::protocol::{
    ConfirmInputAck, ConfirmInputNotification, ConfirmInputRequest, Endpoint, MessageChannel,
    MixMessage, OutboundMessage, PhaseNotification, QueueChannel, RegisterOutputNotification,
    RevealOutputNotification, RevealOutputRequest, RoundParticipant, RoundStatusNotification,
    SigningNotification, SigningRequest,
};
use mixclient::round::{RoundOutcome, RoundStateMachine};
use mixclient::scheduler::{spawn_round, RoundHandle, RoundListener, WalletFacade};

pub const REGISTER_OUTPUT_URL: &str = "https://coordinator.test/rest/registerOutput";

// ---------------------------------------------------------------------------
// Round protocol fakes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ConfirmInput,
    RevealOutput,
    Signing,
    RegisterOutput(String),
    ConfirmInputAck,
    Success,
    Fail,
    ProtocolError(String),
    ResponseError(String),
}

#[derive(Default)]
pub struct RecordingParticipant {
    calls: Mutex<Vec<Call>>,
    /// Reason returned by the coordinator when registering the output
    register_output_rejection: Option<String>,
    fail_signing: bool,
}

impl RecordingParticipant {
    /// Participant whose output registration is refused with `reason`
    pub fn rejecting_output(reason: &str) -> Self {
        Self {
            register_output_rejection: Some(reason.to_string()),
            ..Default::default()
        }
    }

    pub fn failing_signing() -> Self {
        Self {
            fail_signing: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| predicate(c)).count()
    }

    pub fn terminal_calls(&self) -> usize {
        self.count(|c| {
            matches!(
                c,
                Call::Success | Call::Fail | Call::ProtocolError(_) | Call::ResponseError(_)
            )
        })
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl RoundParticipant for RecordingParticipant {
    async fn confirm_input(
        &self,
        notification: &ConfirmInputNotification,
    ) -> std::result::Result<ConfirmInputRequest, ParticipantError> {
        self.record(Call::ConfirmInput);
        Ok(ConfirmInputRequest {
            round_id: notification.round_id.clone(),
            blinded_bordereau64: "YmxpbmRlZA==".into(),
            user_hash: "user-hash".into(),
        })
    }

    async fn reveal_output(
        &self,
        notification: &RevealOutputNotification,
    ) -> std::result::Result<RevealOutputRequest, ParticipantError> {
        self.record(Call::RevealOutput);
        Ok(RevealOutputRequest {
            round_id: notification.round_id.clone(),
            receive_address: "bc1qreceive".into(),
        })
    }

    async fn signing(
        &self,
        notification: &SigningNotification,
    ) -> std::result::Result<SigningRequest, ParticipantError> {
        self.record(Call::Signing);
        if self.fail_signing {
            return Err(anyhow::anyhow!("key not found for input").into());
        }
        Ok(SigningRequest {
            round_id: notification.round_id.clone(),
            witnesses64: vec!["d2l0bmVzcw==".into()],
        })
    }

    async fn register_output(
        &self,
        _notification: &RegisterOutputNotification,
        submission_url: &str,
    ) -> std::result::Result<(), ParticipantError> {
        self.record(Call::RegisterOutput(submission_url.to_string()));
        match &self.register_output_rejection {
            Some(reason) => Err(ChannelError::Http {
                status: 500,
                body: Some(serde_json::json!({ "message": reason }).to_string()),
            }
            .into()),
            None => Ok(()),
        }
    }

    async fn on_confirm_input_ack(
        &self,
        _ack: &ConfirmInputAck,
    ) -> std::result::Result<(), ParticipantError> {
        self.record(Call::ConfirmInputAck);
        Ok(())
    }

    async fn on_success(&self) {
        self.record(Call::Success);
    }

    async fn on_fail(&self) {
        self.record(Call::Fail);
    }

    async fn exit_on_protocol_error(&self, cause: &ProtocolError) {
        self.record(Call::ProtocolError(cause.to_string()));
    }

    async fn exit_on_response_error(&self, message: &str) {
        self.record(Call::ResponseError(message.to_string()));
    }
}

#[derive(Default)]
pub struct RecordingChannel {
    sent: Mutex<Vec<(Endpoint, OutboundMessage)>>,
    pub closed: AtomicBool,
}

impl RecordingChannel {
    pub fn endpoints(&self) -> Vec<Endpoint> {
        self.sent.lock().unwrap().iter().map(|(e, _)| *e).collect()
    }

    pub fn sent(&self) -> Vec<(Endpoint, OutboundMessage)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageChannel for RecordingChannel {
    async fn send(
        &self,
        endpoint: Endpoint,
        payload: OutboundMessage,
    ) -> std::result::Result<(), ChannelError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ChannelError::Closed);
        }
        self.sent.lock().unwrap().push((endpoint, payload));
        Ok(())
    }
}

pub fn machine_with(
    participant: RecordingParticipant,
) -> (RoundStateMachine, Arc<RecordingParticipant>, Arc<RecordingChannel>) {
    let participant = Arc::new(participant);
    let channel = Arc::new(RecordingChannel::default());
    let machine = RoundStateMachine::new(
        "test-round",
        participant.clone(),
        channel.clone(),
        REGISTER_OUTPUT_URL,
    );
    (machine, participant, channel)
}

pub fn machine() -> (RoundStateMachine, Arc<RecordingParticipant>, Arc<RecordingChannel>) {
    machine_with(RecordingParticipant::default())
}

// Inbound message builders

pub fn confirm_input(round_id: &str) -> MixMessage {
    PhaseNotification::ConfirmInput(ConfirmInputNotification {
        round_id: round_id.into(),
        public_key64: "cHVibGljS2V5".into(),
    })
    .into()
}

pub fn register_output(round_id: &str) -> MixMessage {
    PhaseNotification::RegisterOutput(RegisterOutputNotification {
        round_id: round_id.into(),
        inputs_hash: "inputs-hash".into(),
    })
    .into()
}

pub fn reveal_output(round_id: &str) -> MixMessage {
    PhaseNotification::RevealOutput(RevealOutputNotification {
        round_id: round_id.into(),
    })
    .into()
}

pub fn signing(round_id: &str) -> MixMessage {
    PhaseNotification::Signing(SigningNotification {
        round_id: round_id.into(),
        transaction64: "dHg=".into(),
    })
    .into()
}

pub fn success(round_id: &str) -> MixMessage {
    PhaseNotification::Success(RoundStatusNotification {
        round_id: round_id.into(),
    })
    .into()
}

pub fn fail(round_id: &str) -> MixMessage {
    PhaseNotification::Fail(RoundStatusNotification {
        round_id: round_id.into(),
    })
    .into()
}

pub fn ack(round_id: &str) -> MixMessage {
    MixMessage::ConfirmInputAck(ConfirmInputAck {
        round_id: round_id.into(),
        signed_bordereau64: "c2lnbmVk".into(),
    })
}

pub fn server_error(message: &str) -> MixMessage {
    MixMessage::Error {
        message: message.into(),
    }
}

// ---------------------------------------------------------------------------
// Wallet fakes
// ---------------------------------------------------------------------------

pub fn test_pool() -> Pool {
    Pool::new("0.01btc", 1_000_000, 1_000_100, 1_100_000)
}

pub fn queued_entry(hash: &str, vout: u32, account: Account, confirmations: u32) -> EntryRef {
    Arc::new(Entry::with_state(
        EntryKey::new(hash, vout),
        account,
        1_000_500,
        EntryState {
            status: EntryStatus::Queued,
            pool: Some(test_pool()),
            confirmations,
            ..Default::default()
        },
    ))
}

/// Live round session driven by the test through `inbound`
pub struct LiveRound {
    pub inbound: mpsc::Sender<MixMessage>,
    pub participant: Arc<RecordingParticipant>,
    pub outbound: mpsc::Receiver<(Endpoint, OutboundMessage)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartMode {
    /// Keep the listener; the test ends rounds with `finish`
    Record,
    /// Run a real state machine per round
    Spawn,
    /// Refuse every round
    Refuse,
}

pub struct FakeWallet {
    mode: StartMode,
    entries: Mutex<Vec<EntryRef>>,
    listeners: Mutex<Vec<(EntryKey, Arc<dyn RoundListener>)>>,
    live: Mutex<HashMap<EntryKey, LiveRound>>,
    invalidated: Mutex<Vec<Account>>,
    refreshes: AtomicUsize,
}

impl FakeWallet {
    pub fn new(mode: StartMode) -> Self {
        Self {
            mode,
            entries: Mutex::new(Vec::new()),
            listeners: Mutex::new(Vec::new()),
            live: Mutex::new(HashMap::new()),
            invalidated: Mutex::new(Vec::new()),
            refreshes: AtomicUsize::new(0),
        }
    }

    pub fn add(&self, entry: EntryRef) {
        self.entries.lock().unwrap().push(entry);
    }

    pub fn started(&self) -> Vec<EntryKey> {
        self.listeners
            .lock()
            .unwrap()
            .iter()
            .map(|(k, _)| k.clone())
            .collect()
    }

    pub fn invalidated(&self) -> Vec<Account> {
        self.invalidated.lock().unwrap().clone()
    }

    pub fn refreshes(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }

    /// End the latest round started for `key`
    pub async fn finish(&self, key: &EntryKey, outcome: RoundOutcome) {
        let listener = self
            .listeners
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, l)| l.clone());
        if let Some(listener) = listener {
            listener.on_round_end(outcome).await;
        }
    }

    pub fn take_live(&self, key: &EntryKey) -> Option<LiveRound> {
        self.live.lock().unwrap().remove(key)
    }
}

#[async_trait]
impl WalletFacade for FakeWallet {
    async fn list_entries(&self, force_refresh: bool, accounts: &[Account]) -> Result<Vec<EntryRef>> {
        if force_refresh {
            self.refreshes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(self
            .entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| accounts.contains(&e.account()))
            .cloned()
            .collect())
    }

    async fn invalidate_cache(&self, account: Account) {
        self.invalidated.lock().unwrap().push(account);
    }

    async fn start_round(
        &self,
        entry: EntryRef,
        listener: Arc<dyn RoundListener>,
    ) -> Result<RoundHandle> {
        let key = entry.key().clone();
        match self.mode {
            StartMode::Refuse => Err(MixError::Wallet("no session available".into())),
            StartMode::Record => {
                self.listeners.lock().unwrap().push((key.clone(), listener));
                Ok(RoundHandle::new(key))
            }
            StartMode::Spawn => {
                let participant = Arc::new(RecordingParticipant::default());
                let (channel, outbound) = QueueChannel::with_capacity(16);
                let (inbound_tx, inbound_rx) = mpsc::channel(16);
                let machine = RoundStateMachine::new(
                    key.to_string(),
                    participant.clone(),
                    Arc::new(channel),
                    REGISTER_OUTPUT_URL,
                );
                self.listeners
                    .lock()
                    .unwrap()
                    .push((key.clone(), listener.clone()));
                self.live.lock().unwrap().insert(
                    key.clone(),
                    LiveRound {
                        inbound: inbound_tx,
                        participant,
                        outbound,
                    },
                );
                Ok(spawn_round(key, machine, inbound_rx, listener))
            }
        }
    }
}

/// Let spawned tasks run without reaching any scheduler timer
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}
