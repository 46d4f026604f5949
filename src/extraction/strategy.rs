// Ordering of enabled actions during extraction

use crate::ast::Interaction;
use crate::network::{Action, Network};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;

/// Decides in which order the enabled actions of a state are tried.
///
/// Extraction takes the first action that leads to a valid execution
/// graph, so the order shapes the extracted choreography: different
/// policies serialize independent interactions differently.
pub trait OrderingPolicy: Send + Sync {
    /// Arrange `actions`, enabled in `network`, in the order to try them.
    fn order(&self, network: &Network, actions: &mut Vec<Action>);

    /// Like [`OrderingPolicy::order`], also given the processes *marked* on
    /// the current path: those that acted since every live process last did.
    /// Terminated processes and services are always marked.
    fn order_marked(
        &self,
        network: &Network,
        _marked: &BTreeSet<String>,
        actions: &mut Vec<Action>,
    ) {
        self.order(network, actions);
    }
}

/// Built-in ordering policies
///
/// Every policy tries conditionals first, so that a branching process forks
/// the graph before anything else happens. The marking-based policies
/// prefer actions of processes that have not acted lately, which closes
/// loops that involve everyone sooner and so rejects fewer of them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Interactions by sender, then receiver
    #[default]
    Default,
    /// Communications before selections, each by sender, then receiver
    InteractionFirst,
    /// Selections before communications
    ConditionsFirst,
    /// Actions with an unmarked participant before the rest
    UnmarkedFirst,
    /// Like `UnmarkedFirst`, with communications before selections in each group
    UnmarkedThenInteractions,
}

impl Strategy {
    fn rank<'a>(
        self,
        action: &'a Action,
        marked: &BTreeSet<String>,
    ) -> (u8, u8, &'a str, &'a str) {
        let fresh = action
            .participants()
            .into_iter()
            .any(|process| !marked.contains(process));
        let stale = u8::from(self.uses_marking() && !fresh);

        match action {
            Action::Condition { process, .. } => (0, stale, process.as_str(), ""),
            Action::Interaction(interaction) => {
                let selection = matches!(interaction, Interaction::Selection { .. });
                let (class, group) = match self {
                    Strategy::Default => (1, 0),
                    Strategy::InteractionFirst => (1, u8::from(selection)),
                    Strategy::ConditionsFirst => (1, u8::from(!selection)),
                    Strategy::UnmarkedFirst => (1 + stale, 0),
                    Strategy::UnmarkedThenInteractions => (1 + stale, u8::from(selection)),
                };
                (class, group, interaction.sender(), interaction.receiver())
            }
        }
    }

    /// Whether the order depends on the marking.
    pub fn uses_marking(self) -> bool {
        matches!(
            self,
            Strategy::UnmarkedFirst | Strategy::UnmarkedThenInteractions
        )
    }
}

impl OrderingPolicy for Strategy {
    fn order(&self, network: &Network, actions: &mut Vec<Action>) {
        self.order_marked(network, &BTreeSet::new(), actions);
    }

    fn order_marked(
        &self,
        _network: &Network,
        marked: &BTreeSet<String>,
        actions: &mut Vec<Action>,
    ) {
        actions.sort_by(|left, right| self.rank(left, marked).cmp(&self.rank(right, marked)));
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(Strategy::Default),
            "interaction-first" | "interactions-first" => Ok(Strategy::InteractionFirst),
            "conditions-first" => Ok(Strategy::ConditionsFirst),
            "unmarked-first" => Ok(Strategy::UnmarkedFirst),
            "unmarked-then-interactions" => Ok(Strategy::UnmarkedThenInteractions),
            other => Err(format!("unknown extraction strategy `{other}`")),
        }
    }
}
