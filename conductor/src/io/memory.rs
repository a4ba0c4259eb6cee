//! Actor memory files (`.conductor/memory/{session}-{actor}-memory.md`).

use std::fs;
use std::io::ErrorKind;

use anyhow::{Context, Result};

use super::init::ConductorPaths;
use crate::core::actor::Actor;
use crate::core::context::PredecessorOutput;

/// Contents of an actor's memory file, `None` when it was never written.
pub fn read_memory(paths: &ConductorPaths, session_id: &str, actor: Actor) -> Result<Option<String>> {
    let path = paths.memory_path(session_id, actor);
    match fs::read_to_string(&path) {
        Ok(contents) => Ok(Some(contents)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err).with_context(|| format!("read memory {}", path.display())),
    }
}

pub fn memory_exists(paths: &ConductorPaths, session_id: &str, actor: Actor) -> bool {
    paths.memory_path(session_id, actor).is_file()
}

/// What each of `actors` left behind in `session_id`, in the given order.
pub fn predecessor_outputs(
    paths: &ConductorPaths,
    session_id: &str,
    actors: &[Actor],
) -> Result<Vec<PredecessorOutput>> {
    actors
        .iter()
        .map(|&actor| {
            Ok(PredecessorOutput {
                actor,
                location: paths.memory_display(session_id, actor),
                content: read_memory(paths, session_id, actor)?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{temp_workspace, write_memory};

    #[test]
    fn missing_file_reads_as_none() {
        let (_temp, paths) = temp_workspace();
        assert_eq!(read_memory(&paths, "s1", Actor::Research).expect("read"), None);
        assert!(!memory_exists(&paths, "s1", Actor::Research));
    }

    #[test]
    fn collects_outputs_in_predecessor_order() {
        let (_temp, paths) = temp_workspace();
        write_memory(&paths, "s1", Actor::Analysis, "analysis notes");
        let outputs =
            predecessor_outputs(&paths, "s1", &[Actor::Research, Actor::Analysis]).expect("outputs");
        assert_eq!(outputs[0].actor, Actor::Research);
        assert_eq!(outputs[0].content, None);
        assert_eq!(outputs[0].location, ".conductor/memory/s1-research-memory.md");
        assert_eq!(outputs[1].content.as_deref(), Some("analysis notes"));
    }
}
