//! Reply generation

use std::fmt::Write;
use std::sync::Arc;

use async_trait::async_trait;

use crate::Result;
use crate::catalog::Catalog;
use crate::classifier::{Classification, Intent, tokenize};
use crate::db::{ConversationEntry, Profile};

/// Talents listed in one answer
const MAX_TALENTS: usize = 3;

/// Experts listed in one answer
const MAX_EXPERTS: usize = 2;

/// Everything a responder may look at
#[derive(Debug, Clone, Copy)]
pub struct ReplyContext<'a> {
    pub user_id: &'a str,
    pub message: &'a str,
    pub classification: &'a Classification,
    pub profile: Option<&'a Profile>,
    /// Recent turns, oldest first
    pub recent: &'a [ConversationEntry],
}

/// Produces reply text for each action
#[async_trait]
pub trait Responder: Send + Sync {
    /// Direct answer for a confident classification
    ///
    /// # Errors
    ///
    /// Returns error if the reply cannot be produced
    async fn answer(&self, ctx: &ReplyContext<'_>) -> Result<String>;

    /// Clarifying question for a middling classification
    ///
    /// # Errors
    ///
    /// Returns error if the reply cannot be produced
    async fn clarify(&self, ctx: &ReplyContext<'_>) -> Result<String>;

    /// Notice telling the user a human will follow up
    ///
    /// # Errors
    ///
    /// Returns error if the reply cannot be produced
    async fn escalation_notice(&self, ctx: &ReplyContext<'_>) -> Result<String>;
}

/// Fixed templates filled from the catalog
#[derive(Debug, Clone)]
pub struct TemplateResponder {
    catalog: Arc<Catalog>,
}

impl TemplateResponder {
    #[must_use]
    pub const fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }

    fn greeting(ctx: &ReplyContext<'_>) -> String {
        let name = ctx
            .profile
            .and_then(|p| p.display_name.as_deref())
            .map(|n| format!(" {n}"))
            .unwrap_or_default();
        format!(
            "Hello{name}! I can help you find talent, explain contract terms, \
             check schedules and fees, or introduce you to an expert. What are you working on?"
        )
    }

    fn talent_answer(&self, ctx: &ReplyContext<'_>) -> String {
        let mut terms = tokenize(ctx.message);
        if let Some(profile) = ctx.profile {
            terms.extend(profile.interests.iter().flat_map(|i| tokenize(i)));
        }
        let location = ctx.profile.and_then(|p| p.location.as_deref());
        let talents = self.catalog.find_talents(&terms, location, MAX_TALENTS);

        if talents.is_empty() {
            return "I couldn't find a close match on our roster yet. \
                    Could you share the role, location and shoot dates? \
                    Our team can also search beyond the roster."
                .to_string();
        }

        let mut reply = String::from("Here are some talents who may fit:");
        for talent in &talents {
            let _ = write!(reply, "\n- {} ({}", talent.name, talent.category);
            if !talent.location.is_empty() {
                let _ = write!(reply, ", {}", talent.location);
            }
            reply.push(')');
        }
        reply.push_str("\nWould you like availability or a quote for any of them?");
        reply
    }

    fn expert_answer(&self, ctx: &ReplyContext<'_>) -> String {
        let experts = self.catalog.find_experts(&tokenize(ctx.message), MAX_EXPERTS);
        if experts.is_empty() {
            return "We can introduce you to one of our specialists. \
                    Let us know the topic and a team member will arrange it."
                .to_string();
        }

        let mut reply = String::from("These experts could help:");
        for expert in &experts {
            let _ = write!(reply, "\n- {}, {}", expert.name, expert.specialty);
        }
        reply.push_str("\nShall I request an introduction?");
        reply
    }

    fn topic_answer(&self, intent: Intent) -> String {
        self.catalog.topic(intent).map_or_else(
            || {
                "Thanks for your message. Could you tell me a bit more so I can point you \
                 to the right information?"
                    .to_string()
            },
            |topic| topic.answer,
        )
    }
}

#[async_trait]
impl Responder for TemplateResponder {
    async fn answer(&self, ctx: &ReplyContext<'_>) -> Result<String> {
        let reply = match ctx.classification.intent {
            Intent::Greeting => Self::greeting(ctx),
            Intent::TalentSearch => self.talent_answer(ctx),
            Intent::Expert => self.expert_answer(ctx),
            Intent::UserId => format!("Your user ID: {}", ctx.user_id),
            intent @ (Intent::Contract | Intent::Schedule | Intent::Pricing | Intent::General) => {
                self.topic_answer(intent)
            }
            Intent::Unknown => self.topic_answer(Intent::General),
        };
        Ok(reply)
    }

    async fn clarify(&self, ctx: &ReplyContext<'_>) -> Result<String> {
        let question = match ctx.classification.intent {
            Intent::TalentSearch => {
                "Happy to help you find talent. What role are you casting, and do you have \
                 a location, age range or shoot dates in mind?"
            }
            Intent::Contract => {
                "Is your question about a new contract or one already signed? \
                 Let me know which terms you'd like to go over."
            }
            Intent::Expert => "What kind of expert are you looking for, and what would you like to discuss?",
            Intent::Schedule => "Which dates and location are you planning for?",
            Intent::Pricing => {
                "Could you share the role, the number of shoot days and where the work will be used? \
                 That lets us give an accurate quote."
            }
            Intent::Greeting | Intent::General | Intent::Unknown | Intent::UserId => {
                "Could you tell me a little more about what you need? I can help with finding talent, \
                 contracts, schedules, fees or expert introductions."
            }
        };
        Ok(question.to_string())
    }

    async fn escalation_notice(&self, ctx: &ReplyContext<'_>) -> Result<String> {
        let notice = if ctx.classification.is_sensitive {
            "Thank you for telling us. This needs a member of our team, \
             and someone will contact you directly as soon as possible."
        } else {
            "I want to make sure you get the right answer, so I've passed your message \
             to our team. Someone will follow up shortly."
        };
        Ok(notice.to_string())
    }
}
