//! The two sample activities: choosing a color and choosing a puppy.
//!
//! Both exchange the same shape of message (a picture file name plus a
//! display title) but register distinct activity identifiers and message
//! types, so a device running one never adopts sessions of the other.

use serde::{Deserialize, Serialize};

use super::descriptor::{ActivityCategory, ActivityMetadata, GroupActivity};
use crate::message::GroupActivityMessage;

/// A selectable picture: file name sent over the wire and label shown to users.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Choice {
    pub file_name: &'static str,
    pub title: &'static str,
}

pub const COLOR_PALETTE: [Choice; 7] = [
    Choice { file_name: "red", title: "Red" },
    Choice { file_name: "orange", title: "Orange" },
    Choice { file_name: "yellow", title: "Yellow" },
    Choice { file_name: "green", title: "Green" },
    Choice { file_name: "blue", title: "Blue" },
    Choice { file_name: "indigo", title: "Indigo" },
    Choice { file_name: "violet", title: "Violet" },
];

pub const PUPPY_GALLERY: [Choice; 4] = [
    Choice { file_name: "beagle", title: "Beagle" },
    Choice { file_name: "corgi", title: "Corgi" },
    Choice { file_name: "dachshund", title: "Dachshund" },
    Choice { file_name: "husky", title: "Husky" },
];

#[derive(Debug, Clone, Copy, Default)]
pub struct ChooseColorActivity;

impl GroupActivity for ChooseColorActivity {
    const ACTIVITY_IDENTIFIER: &'static str = "net.cockleburr.sample.choose-color";

    fn metadata(&self) -> ActivityMetadata {
        ActivityMetadata {
            title: "Choose Color".to_string(),
            subtitle: "Transmits and receives names of color picture files for display."
                .to_string(),
            category: ActivityCategory::Generic,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChooseColorMessage {
    pub file_name: String,
    pub title: String,
}

impl GroupActivityMessage for ChooseColorMessage {
    const MESSAGE_TYPE: &'static str = "net.cockleburr.sample.choose-color.message";
}

impl From<Choice> for ChooseColorMessage {
    fn from(choice: Choice) -> Self {
        Self {
            file_name: choice.file_name.to_string(),
            title: choice.title.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ChoosePuppyActivity;

impl GroupActivity for ChoosePuppyActivity {
    const ACTIVITY_IDENTIFIER: &'static str = "net.cockleburr.sample.choose-puppy";

    fn metadata(&self) -> ActivityMetadata {
        ActivityMetadata {
            title: "Choose Puppy".to_string(),
            subtitle: "Transmits and receives names of puppy picture files for display."
                .to_string(),
            category: ActivityCategory::Generic,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoosePuppyMessage {
    pub file_name: String,
    pub title: String,
}

impl GroupActivityMessage for ChoosePuppyMessage {
    const MESSAGE_TYPE: &'static str = "net.cockleburr.sample.choose-puppy.message";
}

impl From<Choice> for ChoosePuppyMessage {
    fn from(choice: Choice) -> Self {
        Self {
            file_name: choice.file_name.to_string(),
            title: choice.title.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_activities_do_not_share_identifiers() {
        assert_ne!(
            ChooseColorActivity::ACTIVITY_IDENTIFIER,
            ChoosePuppyActivity::ACTIVITY_IDENTIFIER
        );
        assert_ne!(
            ChooseColorMessage::MESSAGE_TYPE,
            ChoosePuppyMessage::MESSAGE_TYPE
        );
    }

    #[test]
    fn choice_converts_to_message() {
        let message = ChooseColorMessage::from(COLOR_PALETTE[4]);
        assert_eq!(message.file_name, "blue");
        assert_eq!(message.title, "Blue");

        let descriptor = ChoosePuppyActivity.descriptor();
        assert_eq!(descriptor.title(), "Choose Puppy");
    }
}
