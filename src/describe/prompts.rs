//! Prompts for scene description

/// System turn sent with every description request
///
/// The user turn is the JSON array of detected object names.
pub const SCENE_PROMPT: &str = "From a list of objects, create a description of what is happening in the room. \
Answer in one or two short sentences suitable for reading aloud. \
If the list is empty or meaningless, say that the room is empty and nothing is happening.";

/// Phrases that mark a description as saying nothing was seen
///
/// A description containing all of them is not narrated.
pub const UNINFORMATIVE_MARKERS: [&str; 2] = ["empty", "nothing"];
