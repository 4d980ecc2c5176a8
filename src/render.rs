use std::io;

use crate::alloc::AllocPolicy;
use crate::node::{NodeIdx, NodeRef};
use crate::tree::PatriciaMap;

#[cfg(feature = "cli")]
use ansi_term::Colour;

//------------ Debug rendering -----------------------------------------------

// Rendering walks the downlink tree with an explicit stack; uplinks only
// show up in the DOT output, as dashed edges that do not constrain the
// layout.

impl<P, A: AllocPolicy> PatriciaMap<P, A> {
    /// Writes an indented dump of the tree.
    ///
    /// One line per node: branch bit, the key (ASCII-escaped) and its bit
    /// length, indented by tree depth.
    pub fn write_text<W: io::Write>(&self, w: &mut W) -> io::Result<()> {
        let Some(top) = self.top_idx() else {
            return Ok(());
        };
        let mut stack = vec![(top, 0usize)];
        while let Some((n, depth)) = stack.pop() {
            writeln!(
                w,
                "{:indent$}{} \"{}\" ({} bits)",
                "",
                self.branch_tag(n),
                self.keybits(n).0.escape_ascii(),
                self.keybits(n).1,
                indent = 2 * depth
            )?;
            // right pushed first, so the left subtree prints first
            for side in [1, 0] {
                let c = self.child(n, side);
                if self.bpos(c) > self.bpos(n) {
                    stack.push((c, depth + 1));
                }
            }
        }
        Ok(())
    }

    #[cfg(not(feature = "cli"))]
    fn branch_tag(&self, n: NodeIdx) -> String {
        format!("@{:<5}", self.bpos(n))
    }

    #[cfg(feature = "cli")]
    fn branch_tag(&self, n: NodeIdx) -> String {
        Colour::Green
            .paint(format!("@{:<5}", self.bpos(n)))
            .to_string()
    }

    /// Writes the tree as a GraphViz digraph with default node labels.
    pub fn write_dot<W: io::Write>(&self, w: &mut W) -> io::Result<()> {
        self.write_dot_with(w, |n| {
            format!(
                "{} ({}b @{})",
                self.key(n).escape_ascii(),
                self.key_bits(n),
                self.branch_bit(n)
            )
        })
    }

    /// Writes the tree as a GraphViz digraph, labelling each node with the
    /// given callback.
    ///
    /// Downlinks are drawn solid, uplinks dashed and unconstrained; the
    /// root sentinel shows up as a point.
    pub fn write_dot_with<W, F>(&self, w: &mut W, mut label: F) -> io::Result<()>
    where
        W: io::Write,
        F: FnMut(NodeRef) -> String,
    {
        writeln!(w, "digraph patricia {{")?;
        writeln!(w, "  node [shape=box, fontname=\"monospace\"];")?;
        writeln!(w, "  n0 [shape=point, label=\"\"];")?;
        if let Some(top) = self.top_idx() {
            writeln!(w, "  n0 -> {};", self.dot_id(top))?;
            let mut stack = vec![top];
            while let Some(n) = stack.pop() {
                writeln!(
                    w,
                    "  {} [label=\"{}\"];",
                    self.dot_id(n),
                    label(NodeRef(n))
                )?;
                for side in 0..2 {
                    let c = self.child(n, side);
                    if self.bpos(c) > self.bpos(n) {
                        writeln!(
                            w,
                            "  {} -> {};",
                            self.dot_id(n),
                            self.dot_id(c)
                        )?;
                        stack.push(c);
                    } else {
                        writeln!(
                            w,
                            "  {} -> {} [style=dashed, constraint=false];",
                            self.dot_id(n),
                            self.dot_id(c)
                        )?;
                    }
                }
            }
        }
        writeln!(w, "}}")
    }

    fn dot_id(&self, n: NodeIdx) -> String {
        if n.is_sentinel() {
            "n0".into()
        } else {
            // branch bits are unique on any one path but not tree-wide, so
            // key bytes name the node
            format!("k{}_{}", self.keybits(n).1, hex(self.keybits(n).0))
        }
    }
}

fn hex(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{:02x}", b);
    }
    out
}

#[cfg(test)]
mod tests {
    use crate::tree::PatriciaMap;

    #[test]
    fn renders_the_downlink_tree() {
        let mut map = PatriciaMap::new();
        for w in ["a", "b", "ab"] {
            map.insert(w.as_bytes(), (w.len() * 8) as u16, ()).unwrap();
        }

        let mut text = Vec::new();
        map.write_text(&mut text).unwrap();
        let text = String::from_utf8(text).unwrap();
        assert_eq!(text.lines().count(), 3);
        assert!(text.contains("\"ab\" (16 bits)"));

        let mut dot = Vec::new();
        map.write_dot(&mut dot).unwrap();
        let dot = String::from_utf8(dot).unwrap();
        assert!(dot.starts_with("digraph patricia {"));
        // 2N child slots plus the sentinel's edge: N - 1 internal downlinks,
        // N + 1 uplinks
        assert_eq!(dot.matches("style=dashed").count(), 4);
        assert_eq!(
            dot.matches(" -> ").count() - dot.matches("dashed").count(),
            3
        );
    }

    #[test]
    fn empty_tree_renders_empty() {
        let map: PatriciaMap<()> = PatriciaMap::new();
        let mut text = Vec::new();
        map.write_text(&mut text).unwrap();
        assert!(text.is_empty());
        let mut dot = Vec::new();
        map.write_dot(&mut dot).unwrap();
        assert!(String::from_utf8(dot).unwrap().contains("digraph"));
    }
}
