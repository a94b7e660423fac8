use serde::Deserialize;
use serde::Serialize;

/// One scripted assistant answer. `trigger` is matched case-insensitively
/// against the user's text; a reply without a trigger is the fallback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CannedReply {
    #[serde(default)]
    pub trigger: Option<String>,
    #[serde(default)]
    pub thinking: String,
    pub result: String,
    /// Attach the candidate pool to the reply.
    #[serde(default)]
    pub recommend: bool,
    /// Stop after the thinking trace and report this error instead.
    #[serde(default)]
    pub fail_with: Option<String>,
}

impl CannedReply {
    pub fn matches(&self, text: &str) -> bool {
        match &self.trigger {
            Some(trigger) => text.to_lowercase().contains(&trigger.to_lowercase()),
            None => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyScript {
    #[serde(default)]
    pub replies: Vec<CannedReply>,
    pub fallback: CannedReply,
}

impl ReplyScript {
    pub fn pick(&self, text: &str) -> &CannedReply {
        self.replies
            .iter()
            .find(|reply| reply.matches(text))
            .unwrap_or(&self.fallback)
    }
}

impl Default for ReplyScript {
    fn default() -> Self {
        let reply = |trigger: &str, thinking: &str, result: &str, recommend: bool| CannedReply {
            trigger: Some(trigger.to_string()),
            thinking: thinking.to_string(),
            result: result.to_string(),
            recommend,
            fail_with: None,
        };
        Self {
            replies: vec![
                reply(
                    "co-founder",
                    "The user wants a co-founder. Look for builders whose skills complement theirs and who are open to starting something.",
                    "I found a few people who could complement your skills as a co-founder. Swipe through them below.",
                    true,
                ),
                reply(
                    "mentor",
                    "The user is asking for guidance. Prefer people with operating experience in the same space.",
                    "Here are some experienced people who enjoy mentoring founders.",
                    true,
                ),
                reply(
                    "investor",
                    "The user is fundraising. Prefer people who list capital or angel investing as a resource.",
                    "These people have backed early-stage teams before.",
                    true,
                ),
            ],
            fallback: CannedReply {
                trigger: None,
                thinking: "Small talk; answer briefly and invite the user to say who they are looking for."
                    .to_string(),
                result: "Happy to help! Tell me who you'd like to meet, for example a co-founder, a mentor or an investor."
                    .to_string(),
                recommend: false,
                fail_with: None,
            },
        }
    }
}
