use std::path::Path;

use anyhow::Context;
use anyhow::Result;
use anyhow::anyhow;
use chrono::Utc;
use kindred_core::attachments::AttachmentFile;
use kindred_core::outcome::ComposedWhisper;
use kindred_core::profile::FriendRequest;
use kindred_core::profile::Profile;
use kindred_core::profile::ProfileId;
use kindred_core::profile::UserProfile;
use kindred_core::swipe::SwipeDirection;
use kindred_core::ReplyMode;
use kindred_core::RuntimeAction;
use kindred_core::UserAction;
use kindred_exec::AssistantStream;
use kindred_exec::PointerTrace;
use kindred_exec::ReplyScript;
use kindred_exec::SessionDriver;
use serde::Deserialize;
use tracing::debug;

const DEMO_SCRIPT: &str = include_str!("../data/demo.yaml");
/// Upper bound on how far a settle step moves the clock.
const SETTLE_LIMIT_MS: u64 = 60_000;

/// A scripted session: who is chatting, what the assistant answers and
/// the steps to play.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionScript {
    #[serde(default)]
    pub requester: Option<UserProfile>,
    #[serde(default)]
    pub replies: Option<ReplyScript>,
    #[serde(default)]
    pub pool: Option<Vec<Profile>>,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "do", rename_all = "snake_case")]
pub enum Step {
    Say {
        text: String,
        #[serde(default)]
        thinking: bool,
    },
    Wait {
        ms: u64,
    },
    /// Runs the clock until nothing is pending.
    Settle,
    Drag {
        dx: f64,
        #[serde(default)]
        dy: f64,
        #[serde(default = "default_drag_steps")]
        steps: usize,
    },
    Trace {
        trace: PointerTrace,
    },
    Swipe {
        direction: SwipeDirection,
    },
    Whisper {
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        wechat_id: Option<String>,
    },
    Dismiss,
    Quote {
        profile: String,
    },
    Unquote,
    Detail,
    Close,
    NewChat,
    FriendRequest {
        profile: String,
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        wechat_id: Option<String>,
    },
    WhisperBack {
        profile: String,
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        wechat_id: Option<String>,
    },
    Gift {
        profile: String,
        amount: u32,
    },
    Report {
        profile: String,
        reason: String,
        #[serde(default)]
        files: Vec<ScriptFile>,
    },
}

fn default_drag_steps() -> usize {
    6
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScriptFile {
    pub name: String,
    pub mime_type: String,
    pub size_bytes: u64,
}

impl Step {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Say { .. } => "say",
            Self::Wait { .. } => "wait",
            Self::Settle => "settle",
            Self::Drag { .. } => "drag",
            Self::Trace { .. } => "trace",
            Self::Swipe { .. } => "swipe",
            Self::Whisper { .. } => "whisper",
            Self::Dismiss => "dismiss",
            Self::Quote { .. } => "quote",
            Self::Unquote => "unquote",
            Self::Detail => "detail",
            Self::Close => "close",
            Self::NewChat => "new_chat",
            Self::FriendRequest { .. } => "friend_request",
            Self::WhisperBack { .. } => "whisper_back",
            Self::Gift { .. } => "gift",
            Self::Report { .. } => "report",
        }
    }
}

impl SessionScript {
    pub fn demo() -> Result<Self> {
        serde_yaml::from_str(DEMO_SCRIPT).context("parse built-in demo script")
    }

    /// Reads a script as JSON when the extension says so, YAML otherwise.
    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("read script {}", path.display()))?;
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            serde_json::from_str(&source).with_context(|| format!("parse {}", path.display()))
        } else {
            serde_yaml::from_str(&source).with_context(|| format!("parse {}", path.display()))
        }
    }
}

fn whisper(message: &Option<String>, wechat_id: &Option<String>) -> ComposedWhisper {
    ComposedWhisper {
        message: message.clone(),
        wechat_id: wechat_id.clone(),
    }
}

fn find<'a>(pool: &'a [Profile], id: &str) -> Result<&'a Profile> {
    pool.iter()
        .find(|profile| profile.id.as_str() == id)
        .ok_or_else(|| anyhow!("no profile `{id}` in the candidate pool"))
}

/// Plays one step against the driver. `pool` resolves profile ids named by
/// the script.
pub fn play_step<A: AssistantStream>(
    driver: &mut SessionDriver<A>,
    pool: &[Profile],
    step: &Step,
) -> Result<()> {
    debug!(step = step.label(), now_ms = driver.now_ms(), "playing step");
    match step {
        Step::Say { text, thinking } => driver.dispatch(UserAction::SendMessage {
            text: text.clone(),
            mode: if *thinking {
                ReplyMode::Thinking
            } else {
                ReplyMode::Standard
            },
        }),
        Step::Wait { ms } => driver.advance(*ms),
        Step::Settle => driver.run_until_idle(SETTLE_LIMIT_MS),
        Step::Drag { dx, dy, steps } => {
            let mut trace = PointerTrace::horizontal(*dx, *steps, 16);
            for (sample, i) in trace.samples.iter_mut().zip(1..) {
                sample.1 = dy * i as f64 / (*steps).max(1) as f64;
            }
            driver.play(&trace);
        }
        Step::Trace { trace } => driver.play(trace),
        Step::Swipe { direction } => driver.dispatch(UserAction::SwipeButton(*direction)),
        Step::Whisper { message, wechat_id } => {
            driver.dispatch(UserAction::SendWhisper(whisper(message, wechat_id)))
        }
        Step::Dismiss => driver.dispatch(UserAction::DismissComposer),
        Step::Quote { profile } => {
            driver.dispatch(UserAction::QuoteContact(find(pool, profile)?.quote()))
        }
        Step::Unquote => driver.dispatch(UserAction::ClearQuote),
        Step::Detail => driver.dispatch(UserAction::ToggleCardDetail),
        Step::Close => driver.dispatch(UserAction::CloseStack),
        Step::NewChat => driver.dispatch(UserAction::SwitchConversation),
        Step::FriendRequest {
            profile,
            message,
            wechat_id,
        } => driver.inject(RuntimeAction::ReceiveFriendRequest(FriendRequest {
            profile: find(pool, profile)?.clone(),
            requested_at: Utc::now(),
            message: message.clone(),
            wechat_id: wechat_id.clone(),
        })),
        Step::WhisperBack {
            profile,
            message,
            wechat_id,
        } => driver.dispatch(UserAction::WhisperBack {
            request_id: ProfileId::new(profile.as_str()),
            whisper: whisper(message, wechat_id),
        }),
        Step::Gift { profile, amount } => driver.dispatch(UserAction::Gift {
            profile_id: ProfileId::new(profile.as_str()),
            amount: *amount,
        }),
        Step::Report {
            profile,
            reason,
            files,
        } => {
            driver.dispatch(UserAction::OpenReport {
                profile_id: ProfileId::new(profile.as_str()),
            });
            if !files.is_empty() {
                driver.dispatch(UserAction::AddReportFiles(
                    files
                        .iter()
                        .map(|file| AttachmentFile {
                            name: file.name.clone(),
                            mime_type: file.mime_type.clone(),
                            size_bytes: file.size_bytes,
                        })
                        .collect(),
                ));
            }
            driver.dispatch(UserAction::SubmitReport {
                reason: reason.clone(),
            });
        }
    }
    Ok(())
}
