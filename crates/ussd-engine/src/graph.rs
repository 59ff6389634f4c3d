//! Navigation graph.
//!
//! A finite tree of menu nodes rooted at a single entry node. Geography
//! nodes carry no children list of their own: their options are resolved
//! lazily from the [`GeographyService`](crate::services::GeographyService)
//! when a walk enters them.

use std::collections::{HashMap, HashSet, VecDeque};

use ussd_core::types::{Field, GeoLevel, Language};

use crate::error::GraphError;
use crate::prompts::Message;
use crate::validation::ValidatorTag;

pub type NodeId = &'static str;

pub const ROOT: NodeId = "main";

/// Text shown next to a choice key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Label {
    /// Localised catalog entry.
    Message(Message),
    /// Fixed text, shown as-is in every language.
    Text(String),
}

/// One outgoing edge of a fixed-choice node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    pub key: String,
    pub label: Label,
    pub next: NodeId,
    /// Field bound when this choice is taken.
    pub binds: Option<(Field, String)>,
}

impl Choice {
    pub fn new(key: &str, label: Message, next: NodeId) -> Self {
        Self {
            key: key.to_string(),
            label: Label::Message(label),
            next,
            binds: None,
        }
    }
}

/// What reaching a terminal node does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalAction {
    /// End the session with a catalog message.
    Say(Message),
    SubmitRegistration,
    LookupStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    FixedChoice {
        choices: Vec<Choice>,
        case_insensitive: bool,
    },
    FreeText {
        field: Field,
        validator: ValidatorTag,
        next: NodeId,
    },
    /// Numbered list of units at `level`, scoped by the unit selected at
    /// the parent level. An empty list offers only `0` to skip.
    Geography { level: GeoLevel, next: NodeId },
    Terminal(TerminalAction),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuNode {
    pub id: NodeId,
    pub prompt: Message,
    pub kind: NodeKind,
}

impl MenuNode {
    pub fn is_terminal(&self) -> bool {
        matches!(self.kind, NodeKind::Terminal(_))
    }

    /// Distinct child node ids, in declaration order.
    pub fn children(&self) -> Vec<NodeId> {
        let mut out: Vec<NodeId> = Vec::new();
        let mut push = |id: NodeId| {
            if !out.contains(&id) {
                out.push(id);
            }
        };
        match &self.kind {
            NodeKind::FixedChoice { choices, .. } => choices.iter().for_each(|c| push(c.next)),
            NodeKind::FreeText { next, .. } | NodeKind::Geography { next, .. } => push(*next),
            NodeKind::Terminal(_) => {}
        }
        out
    }
}

/// Read-only menu tree, built once at startup and shared by every request.
#[derive(Debug, Clone)]
pub struct NavigationGraph {
    root: NodeId,
    nodes: HashMap<NodeId, MenuNode>,
    depths: HashMap<NodeId, usize>,
}

impl NavigationGraph {
    /// Build a graph, checking that `nodes` form a tree rooted at `root`.
    pub fn new(root: NodeId, nodes: Vec<MenuNode>) -> Result<Self, GraphError> {
        let mut map: HashMap<NodeId, MenuNode> = HashMap::with_capacity(nodes.len());
        for node in nodes {
            if map.contains_key(node.id) {
                return Err(GraphError::DuplicateNode(node.id.to_string()));
            }
            map.insert(node.id, node);
        }
        if !map.contains_key(root) {
            return Err(GraphError::UnknownRoot(root.to_string()));
        }

        let mut parent_of: HashMap<NodeId, NodeId> = HashMap::new();
        for node in map.values() {
            let children = node.children();
            if children.is_empty() && !node.is_terminal() {
                return Err(GraphError::NoChildren(node.id.to_string()));
            }
            for child in children {
                if !map.contains_key(child) {
                    return Err(GraphError::DanglingEdge {
                        from: node.id.to_string(),
                        to: child.to_string(),
                    });
                }
                if child == root || parent_of.insert(child, node.id).is_some() {
                    return Err(GraphError::MultipleParents(child.to_string()));
                }
            }
        }

        let mut depths = HashMap::with_capacity(map.len());
        let mut queue = VecDeque::from([(root, 0usize)]);
        let mut seen = HashSet::new();
        while let Some((id, depth)) = queue.pop_front() {
            if !seen.insert(id) {
                continue;
            }
            depths.insert(id, depth);
            if let Some(node) = map.get(id) {
                queue.extend(node.children().into_iter().map(|c| (c, depth + 1)));
            }
        }
        if let Some(orphan) = map.keys().find(|id| !depths.contains_key(*id)) {
            return Err(GraphError::Unreachable(orphan.to_string()));
        }

        Ok(Self {
            root,
            nodes: map,
            depths,
        })
    }

    /// The deployment menu: registration (with optional home location)
    /// and membership status lookup.
    pub fn standard(languages: &[Language]) -> Result<Self, GraphError> {
        let language_choices = languages
            .iter()
            .enumerate()
            .map(|(i, lang)| Choice {
                key: (i + 1).to_string(),
                label: Label::Text(lang.display_name().to_string()),
                next: "reg_first_name",
                binds: Some((Field::Language, lang.code().to_string())),
            })
            .collect();

        let free_text = |id, prompt, field, validator, next| MenuNode {
            id,
            prompt,
            kind: NodeKind::FreeText {
                field,
                validator,
                next,
            },
        };
        let geography = |id, prompt, level, next| MenuNode {
            id,
            prompt,
            kind: NodeKind::Geography { level, next },
        };
        let terminal = |id, action| MenuNode {
            id,
            prompt: Message::Goodbye,
            kind: NodeKind::Terminal(action),
        };

        let nodes = vec![
            fixed(
                ROOT,
                Message::MainMenu,
                vec![
                    Choice::new("1", Message::Register, "reg_language"),
                    Choice::new("2", Message::CheckStatus, "status_number"),
                    Choice::new("0", Message::Exit, "exit"),
                ],
            ),
            terminal("exit", TerminalAction::Say(Message::Goodbye)),
            // Registration
            fixed("reg_language", Message::LanguageMenu, language_choices),
            free_text(
                "reg_first_name",
                Message::FirstName,
                Field::FirstName,
                ValidatorTag::Name,
                "reg_last_name",
            ),
            free_text(
                "reg_last_name",
                Message::LastName,
                Field::LastName,
                ValidatorTag::Name,
                "reg_national_id",
            ),
            free_text(
                "reg_national_id",
                Message::NationalId,
                Field::NationalId,
                ValidatorTag::NationalId,
                "reg_dob",
            ),
            free_text(
                "reg_dob",
                Message::DateOfBirth,
                Field::DateOfBirth,
                ValidatorTag::DateOfBirth,
                "reg_confirm",
            ),
            fixed(
                "reg_confirm",
                Message::ConfirmRegistration,
                vec![
                    Choice::new("1", Message::Confirm, "reg_submit"),
                    Choice::new("2", Message::AddLocation, "reg_province"),
                    Choice::new("0", Message::Cancel, "reg_cancelled"),
                ],
            ),
            terminal("reg_submit", TerminalAction::SubmitRegistration),
            terminal("reg_cancelled", TerminalAction::Say(Message::Cancelled)),
            // Home location
            geography("reg_province", Message::SelectProvince, GeoLevel::Province, "reg_district"),
            geography("reg_district", Message::SelectDistrict, GeoLevel::District, "reg_constituency"),
            geography(
                "reg_constituency",
                Message::SelectConstituency,
                GeoLevel::Constituency,
                "reg_ward",
            ),
            geography("reg_ward", Message::SelectWard, GeoLevel::Ward, "reg_located_confirm"),
            fixed(
                "reg_located_confirm",
                Message::ConfirmLocation,
                vec![
                    Choice::new("1", Message::Confirm, "reg_located_submit"),
                    Choice::new("0", Message::Cancel, "reg_located_cancelled"),
                ],
            ),
            terminal("reg_located_submit", TerminalAction::SubmitRegistration),
            terminal("reg_located_cancelled", TerminalAction::Say(Message::Cancelled)),
            // Status
            free_text(
                "status_number",
                Message::MembershipNumber,
                Field::MembershipNumber,
                ValidatorTag::MembershipNumber,
                "status_result",
            ),
            terminal("status_result", TerminalAction::LookupStatus),
        ];

        Self::new(ROOT, nodes)
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: &str) -> Option<&MenuNode> {
        self.nodes.get(id)
    }

    /// Edges between the root and `id`.
    pub fn depth(&self, id: &str) -> Option<usize> {
        self.depths.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

fn fixed(id: NodeId, prompt: Message, choices: Vec<Choice>) -> MenuNode {
    MenuNode {
        id,
        prompt,
        kind: NodeKind::FixedChoice {
            choices,
            case_insensitive: false,
        },
    }
}
