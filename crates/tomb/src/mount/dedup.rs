use super::node::Node;

/// Find a sibling name that does not collide in `node`.
///
/// `report.pdf` becomes `report (1).pdf`, then `report (2).pdf`, and so
/// on. The name is returned unchanged when it is already free.
pub fn unique_name(node: &Node, desired: &str) -> String {
    if !node.contains(desired) {
        return desired.to_string();
    }

    let (stem, ext) = match desired.rsplit_once('.') {
        // dotfiles like ".config" keep their leading dot as part of the stem
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (desired, None),
    };

    let mut n = 1u32;
    loop {
        let candidate = match ext {
            Some(ext) => format!("{} ({}).{}", stem, n, ext),
            None => format!("{} ({})", stem, n),
        };
        if !node.contains(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// A name for a duplicate of an existing entry, in the `Copy of X` style,
/// numbered if that is taken too.
pub fn copy_name(node: &Node, original: &str) -> String {
    unique_name(node, &format!("Copy of {}", original))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::crypto::Secret;
    use crate::linked_data::Link;
    use crate::mount::node::{DirInfo, NodeLink};

    fn node_with(names: &[&str]) -> Node {
        let mut node = Node::new();
        for name in names {
            node.insert(
                name.to_string(),
                NodeLink::Dir(Link::default(), Secret::default(), DirInfo::new()),
            );
        }
        node
    }

    #[test]
    fn test_free_name_passes_through() {
        let node = node_with(&["a.txt"]);
        assert_eq!(unique_name(&node, "b.txt"), "b.txt");
    }

    #[test]
    fn test_numbering_respects_extension() {
        let node = node_with(&["report.pdf", "report (1).pdf"]);
        assert_eq!(unique_name(&node, "report.pdf"), "report (2).pdf");
    }

    #[test]
    fn test_no_extension() {
        let node = node_with(&["notes"]);
        assert_eq!(unique_name(&node, "notes"), "notes (1)");
    }

    #[test]
    fn test_dotfile_keeps_dot() {
        let node = node_with(&[".config"]);
        assert_eq!(unique_name(&node, ".config"), ".config (1)");
    }

    #[test]
    fn test_copy_name() {
        let node = node_with(&["photo.png", "Copy of photo.png"]);
        assert_eq!(copy_name(&node, "photo.png"), "Copy of photo (1).png");
        let node = node_with(&["photo.png"]);
        assert_eq!(copy_name(&node, "photo.png"), "Copy of photo.png");
    }
}
