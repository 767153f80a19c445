//! Block Kit model: just enough of Slack's layout/element vocabulary for the
//! screens this bot renders, serialized to the exact wire shape.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Block {
    #[serde(rename = "section")]
    Section {
        text: Text,
        #[serde(skip_serializing_if = "Option::is_none")]
        accessory: Option<Element>,
    },
    #[serde(rename = "context")]
    Context { elements: Vec<Text> },
    #[serde(rename = "actions")]
    Actions { elements: Vec<Element> },
}

impl Block {
    pub fn section(text: Text) -> Self {
        Block::Section {
            text,
            accessory: None,
        }
    }

    pub fn section_with(text: Text, accessory: Element) -> Self {
        Block::Section {
            text,
            accessory: Some(accessory),
        }
    }

    pub fn context(text: Text) -> Self {
        Block::Context {
            elements: vec![text],
        }
    }

    pub fn actions(elements: Vec<Element>) -> Self {
        Block::Actions { elements }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Text {
    #[serde(rename = "plain_text")]
    Plain { text: String },
    #[serde(rename = "mrkdwn")]
    Mrkdwn { text: String },
}

impl Text {
    pub fn plain(text: impl Into<String>) -> Self {
        Text::Plain { text: text.into() }
    }

    pub fn mrkdwn(text: impl Into<String>) -> Self {
        Text::Mrkdwn { text: text.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Element {
    #[serde(rename = "button")]
    Button {
        action_id: String,
        text: Text,
        value: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        style: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        confirm: Option<Confirm>,
    },
    #[serde(rename = "static_select")]
    StaticSelect {
        action_id: String,
        placeholder: Text,
        options: Vec<SelectOption>,
    },
    #[serde(rename = "multi_users_select")]
    MultiUsersSelect {
        action_id: String,
        placeholder: Text,
        initial_users: Vec<String>,
    },
}

impl Element {
    pub fn button(action_id: &str, label: &str, value: impl Into<String>) -> Self {
        Element::Button {
            action_id: action_id.to_string(),
            text: Text::plain(label),
            value: value.into(),
            style: None,
            confirm: None,
        }
    }

    pub fn primary(self) -> Self {
        self.styled("primary")
    }

    pub fn danger(self) -> Self {
        self.styled("danger")
    }

    fn styled(mut self, new_style: &str) -> Self {
        if let Element::Button { ref mut style, .. } = self {
            *style = Some(new_style.to_string());
        }
        self
    }

    pub fn with_confirm(mut self, dialog: Confirm) -> Self {
        if let Element::Button { ref mut confirm, .. } = self {
            *confirm = Some(dialog);
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectOption {
    pub text: Text,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Confirm {
    pub title: Text,
    pub text: Text,
    pub confirm: Text,
    pub deny: Text,
}

impl Confirm {
    pub fn new(title: &str, text: &str, confirm: &str, deny: &str) -> Self {
        Self {
            title: Text::plain(title),
            text: Text::mrkdwn(text),
            confirm: Text::plain(confirm),
            deny: Text::plain(deny),
        }
    }
}
