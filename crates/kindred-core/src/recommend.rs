use std::collections::BTreeSet;

use regex::Regex;
use regex::RegexSet;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;
use tracing::warn;

use crate::profile::Profile;
use crate::profile::ProfileId;
use crate::profile::UserProfile;

pub const NO_MORE_MATCHES: &str =
    "I couldn't find anyone new for that request. You've already reached everyone who fits; try describing someone different.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainTag {
    Ai,
    Fintech,
    Health,
    Climate,
    Education,
}

impl DomainTag {
    pub fn label(self) -> &'static str {
        match self {
            Self::Ai => "AI",
            Self::Fintech => "fintech",
            Self::Health => "health",
            Self::Climate => "climate",
            Self::Education => "education",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchCategory {
    Cofounder,
    Mentor,
    Investor,
    Domain(DomainTag),
    Generic,
}

impl MatchCategory {
    pub fn label(self) -> &'static str {
        match self {
            Self::Cofounder => "co-founder",
            Self::Mentor => "mentor",
            Self::Investor => "investor",
            Self::Domain(tag) => tag.label(),
            Self::Generic => "generic",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentRule {
    pub category: MatchCategory,
    pub keywords: Vec<String>,
    /// Higher wins when several rules match the same message.
    pub breadth: u8,
}

#[derive(Debug, thiserror::Error)]
pub enum RuleTableError {
    #[error("parse intent rules: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("rule for {category} has no keywords")]
    EmptyRule { category: &'static str },
    #[error("compile keywords for {category}: {source}")]
    Pattern {
        category: &'static str,
        #[source]
        source: regex::Error,
    },
}

#[derive(Debug, Clone)]
struct CompiledRule {
    rule: IntentRule,
    pattern: Regex,
}

/// Ordered keyword rules mapping free text to a [`MatchCategory`].
#[derive(Debug, Clone)]
pub struct IntentRuleTable {
    rules: Vec<CompiledRule>,
}

fn rule(category: MatchCategory, breadth: u8, keywords: &[&str]) -> IntentRule {
    IntentRule {
        category,
        keywords: keywords.iter().map(|k| k.to_string()).collect(),
        breadth,
    }
}

pub fn default_rules() -> Vec<IntentRule> {
    vec![
        rule(
            MatchCategory::Investor,
            3,
            &["investor", "investors", "angel", "vc", "funding", "fundraise", "raise money"],
        ),
        rule(
            MatchCategory::Cofounder,
            3,
            &["co-founder", "cofounder", "co founder", "founding partner", "technical partner"],
        ),
        rule(
            MatchCategory::Mentor,
            3,
            &["mentor", "mentors", "mentorship", "advisor", "adviser", "coach"],
        ),
        rule(
            MatchCategory::Domain(DomainTag::Ai),
            1,
            &["ai", "machine learning", "llm", "deep learning", "data science"],
        ),
        rule(
            MatchCategory::Domain(DomainTag::Fintech),
            1,
            &["fintech", "payments", "banking", "blockchain", "crypto"],
        ),
        rule(
            MatchCategory::Domain(DomainTag::Health),
            1,
            &["health", "healthcare", "medical", "biotech"],
        ),
        rule(
            MatchCategory::Domain(DomainTag::Climate),
            1,
            &["climate", "energy", "sustainability", "carbon"],
        ),
        rule(
            MatchCategory::Domain(DomainTag::Education),
            1,
            &["education", "edtech", "tutoring", "teaching"],
        ),
    ]
}

fn keyword_pattern(rule: &IntentRule) -> Result<Regex, RuleTableError> {
    let category = rule.category.label();
    if rule.keywords.is_empty() {
        return Err(RuleTableError::EmptyRule { category });
    }
    let alternation = rule
        .keywords
        .iter()
        .map(|keyword| regex::escape(&keyword.to_lowercase()))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&bounded(&alternation))
        .map_err(|source| RuleTableError::Pattern { category, source })
}

/// Matches `inner` only where it is not glued to other word characters.
/// Unlike `\b` this also works for terms such as "c++" or "c#".
fn bounded(inner: &str) -> String {
    format!(r"(?:^|\W)(?:{inner})(?:\W|$)")
}

impl Default for IntentRuleTable {
    fn default() -> Self {
        let rules = default_rules()
            .into_iter()
            .filter_map(|rule| match keyword_pattern(&rule) {
                Ok(pattern) => Some(CompiledRule { rule, pattern }),
                Err(err) => {
                    warn!("dropping built-in intent rule: {err}");
                    None
                }
            })
            .collect();
        Self { rules }
    }
}

impl IntentRuleTable {
    pub fn new(rules: Vec<IntentRule>) -> Result<Self, RuleTableError> {
        let rules = rules
            .into_iter()
            .map(|rule| {
                let pattern = keyword_pattern(&rule)?;
                Ok(CompiledRule { rule, pattern })
            })
            .collect::<Result<Vec<_>, RuleTableError>>()?;
        Ok(Self { rules })
    }

    pub fn from_yaml(source: &str) -> Result<Self, RuleTableError> {
        let rules: Vec<IntentRule> = serde_yaml::from_str(source)?;
        Self::new(rules)
    }

    pub fn rules(&self) -> impl Iterator<Item = &IntentRule> {
        self.rules.iter().map(|compiled| &compiled.rule)
    }

    /// Picks the broadest matching rule; equal breadth keeps table order.
    pub fn classify(&self, text: &str) -> MatchCategory {
        let lower = text.to_lowercase();
        let mut best: Option<&IntentRule> = None;
        for compiled in &self.rules {
            if !compiled.pattern.is_match(&lower) {
                continue;
            }
            if best.map_or(true, |current| compiled.rule.breadth > current.breadth) {
                best = Some(&compiled.rule);
            }
        }
        best.map_or(MatchCategory::Generic, |rule| rule.category)
    }

    fn pattern_for(&self, category: MatchCategory) -> Option<&Regex> {
        self.rules
            .iter()
            .find(|compiled| compiled.rule.category == category)
            .map(|compiled| &compiled.pattern)
    }

    /// Profiles in `pool` that fit `category`, narrowed by any skill named
    /// in the query. Falls back to the whole pool when nothing fits.
    pub fn select_candidates(
        &self,
        pool: &[Profile],
        category: MatchCategory,
        query: &str,
    ) -> Vec<Profile> {
        let mut subset: Vec<Profile> = match self.pattern_for(category) {
            Some(pattern) => pool
                .iter()
                .filter(|profile| pattern.is_match(&profile.searchable_text()))
                .cloned()
                .collect(),
            None => Vec::new(),
        };
        if subset.is_empty() {
            subset = pool.to_vec();
        }

        let skills = skills_named_in(query, &subset);
        if !skills.is_empty() {
            let narrowed: Vec<Profile> = subset
                .iter()
                .filter(|profile| skills.iter().any(|skill| profile.has_skill(skill)))
                .cloned()
                .collect();
            if !narrowed.is_empty() {
                subset = narrowed;
            }
        }
        subset
    }
}

/// Pool skills the query names, lowercased and sorted.
fn skills_named_in(query: &str, pool: &[Profile]) -> Vec<String> {
    let known: Vec<String> = pool
        .iter()
        .flat_map(|profile| profile.skills.iter())
        .map(|skill| skill.trim().to_lowercase())
        .filter(|skill| !skill.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    if known.is_empty() {
        return Vec::new();
    }
    let set = match RegexSet::new(known.iter().map(|skill| bounded(&regex::escape(skill)))) {
        Ok(set) => set,
        Err(err) => {
            warn!(skills = known.len(), "skill patterns did not compile: {err}");
            return Vec::new();
        }
    };
    set.matches(&query.to_lowercase())
        .into_iter()
        .map(|index| known[index].clone())
        .collect()
}

/// Drops every profile the user already contacted.
pub fn filter_contacted(profiles: Vec<Profile>, contacted: &BTreeSet<ProfileId>) -> Vec<Profile> {
    profiles
        .into_iter()
        .filter(|profile| !contacted.contains(&profile.id))
        .collect()
}

fn join_natural(items: &[&str]) -> String {
    match items {
        [] => String::new(),
        [one] => (*one).to_string(),
        [head @ .., last] => format!("{} and {}", head.join(", "), last),
    }
}

/// Deterministic match rationale for one candidate.
pub fn why_match(category: MatchCategory, candidate: &Profile, requester: &UserProfile) -> String {
    let complementary: Vec<&str> = candidate
        .skills
        .iter()
        .filter(|skill| {
            !requester
                .skills
                .iter()
                .any(|own| own.eq_ignore_ascii_case(skill))
        })
        .take(2)
        .map(String::as_str)
        .collect();
    let shared: Vec<&str> = candidate
        .skills
        .iter()
        .filter(|skill| {
            requester
                .skills
                .iter()
                .any(|own| own.eq_ignore_ascii_case(skill))
        })
        .take(2)
        .map(String::as_str)
        .collect();
    let top_skills: Vec<&str> = candidate.skills.iter().take(2).map(String::as_str).collect();

    let place = if candidate
        .location
        .eq_ignore_ascii_case(requester.location.as_str())
    {
        format!("you're both in {}", candidate.location)
    } else {
        format!("{} is based in {}", candidate.name, candidate.location)
    };
    let goal = requester
        .goals
        .first()
        .map(|goal| format!(" as you {goal}"))
        .unwrap_or_default();

    let strengths = if top_skills.is_empty() {
        "relevant experience".to_string()
    } else {
        join_natural(&top_skills)
    };

    match category {
        MatchCategory::Cofounder => {
            let brings = if complementary.is_empty() {
                strengths.clone()
            } else {
                join_natural(&complementary)
            };
            let yours = if requester.skills.is_empty() {
                "your vision".to_string()
            } else {
                format!(
                    "your {}",
                    join_natural(&requester.skills.iter().map(String::as_str).collect::<Vec<_>>())
                )
            };
            format!(
                "Co-founder fit: {} brings {} to pair with {}{}; {}.",
                candidate.name, brings, yours, goal, place
            )
        }
        MatchCategory::Mentor => format!(
            "Mentor fit: {} has hands-on experience in {} and can guide you{}; {}.",
            candidate.name, strengths, goal, place
        ),
        MatchCategory::Investor => {
            let backing = if candidate.resources.is_empty() {
                "early-stage backing".to_string()
            } else {
                join_natural(&candidate.resources.iter().take(2).map(String::as_str).collect::<Vec<_>>())
            };
            format!(
                "Investor fit: {} offers {} for founders{}; {}.",
                candidate.name, backing, goal, place
            )
        }
        MatchCategory::Domain(tag) => format!(
            "Works in {}: {} focuses on {}{}; {}.",
            tag.label(),
            candidate.name,
            strengths,
            goal,
            place
        ),
        MatchCategory::Generic => {
            let overlap = if shared.is_empty() {
                format!("brings {strengths}")
            } else {
                format!("shares your interest in {}", join_natural(&shared))
            };
            format!("{} {}; {}.", candidate.name, overlap, place)
        }
    }
}

/// What the previous recommendation round surfaced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversationState {
    pub last_query: Option<String>,
    pub last_category: Option<MatchCategory>,
    pub available_contacts: Vec<Profile>,
    pub shown_contacts: BTreeSet<ProfileId>,
    pub current_index: usize,
}

impl ConversationState {
    /// Records a surfaced batch. A different category starts over; the
    /// same category keeps accumulating what has been shown.
    pub fn record(&mut self, query: &str, plan: &RecommendationPlan) {
        let RecommendationPlan::Surface { category, profiles } = plan else {
            return;
        };
        if self.last_category != Some(*category) {
            self.shown_contacts.clear();
        }
        self.last_query = Some(query.to_string());
        self.last_category = Some(*category);
        self.available_contacts = profiles.clone();
        self.shown_contacts
            .extend(profiles.iter().map(|profile| profile.id.clone()));
        self.current_index = 0;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecommendationPlan {
    Surface {
        category: MatchCategory,
        profiles: Vec<Profile>,
    },
    NoMoreMatches {
        category: MatchCategory,
        reply: String,
    },
}

#[derive(Debug, Clone, Default)]
pub struct RecommendationCoordinator {
    rules: IntentRuleTable,
}

impl RecommendationCoordinator {
    pub fn new(rules: IntentRuleTable) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &IntentRuleTable {
        &self.rules
    }

    /// Decides what to surface for `query`. Pure: calling it twice with the
    /// same inputs yields the same plan.
    pub fn plan(
        &self,
        query: &str,
        pool: &[Profile],
        contacted: &BTreeSet<ProfileId>,
        conversation: &ConversationState,
        requester: &UserProfile,
    ) -> RecommendationPlan {
        let category = self.rules.classify(query);
        let candidates = self.rules.select_candidates(pool, category, query);
        let mut profiles = filter_contacted(candidates, contacted);

        if conversation.last_category == Some(category) {
            profiles.retain(|profile| !conversation.shown_contacts.contains(&profile.id));
        }

        debug!(
            category = category.label(),
            surfaced = profiles.len(),
            "planned recommendation batch"
        );

        if profiles.is_empty() {
            return RecommendationPlan::NoMoreMatches {
                category,
                reply: NO_MORE_MATCHES.to_string(),
            };
        }

        for profile in &mut profiles {
            profile.why_match = why_match(category, profile, requester);
        }
        RecommendationPlan::Surface { category, profiles }
    }
}
