//! Raw road network edge lists
//!
//! Whitespace-separated text: the node count, then one `u v weight` triple
//! per undirected edge. Weights may be fractional and are rounded to the
//! nearest integer.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

use super::FormatError;
use crate::graph::Graph;

pub fn read_raw_graph<P: AsRef<Path>>(path: P) -> Result<Graph, FormatError> {
    let text = fs::read_to_string(path)?;
    parse_raw_graph(&text)
}

pub fn parse_raw_graph(text: &str) -> Result<Graph, FormatError> {
    let mut tokens = text.split_whitespace().enumerate();

    let n_nodes = match tokens.next() {
        Some((i, token)) => parse_token::<u32>(i, token, "node count")?,
        None => {
            return Err(FormatError::Malformed {
                token: 0,
                message: "missing node count".to_string(),
            })
        }
    };

    let mut graph = Graph::new(n_nodes);

    while let Some((i, token)) = tokens.next() {
        let u = parse_node(i, token, n_nodes)?;
        let v = match tokens.next() {
            Some((j, token)) => parse_node(j, token, n_nodes)?,
            None => return Err(truncated(i + 1)),
        };
        let weight = match tokens.next() {
            Some((j, token)) => parse_weight(j, token)?,
            None => return Err(truncated(i + 2)),
        };

        graph.add_edge(u, v, weight);
    }

    Ok(graph)
}

/// Write an undirected graph; each edge appears once, as `u v weight` with `u <= v`
pub fn write_raw_graph<P: AsRef<Path>>(path: P, graph: &Graph) -> Result<(), FormatError> {
    let mut writer = BufWriter::new(fs::File::create(path)?);
    writeln!(writer, "{}", graph.size())?;

    let mut edges: Vec<(u32, u32, u32)> = graph.arcs().filter(|&(u, v, _)| u <= v).collect();
    edges.sort_unstable();
    for (u, v, w) in edges {
        writeln!(writer, "{} {} {}", u, v, w)?;
    }

    writer.flush()?;
    Ok(())
}

fn parse_token<T: std::str::FromStr>(
    token: usize,
    text: &str,
    what: &str,
) -> Result<T, FormatError> {
    text.parse().map_err(|_| FormatError::Malformed {
        token,
        message: format!("invalid {}: {:?}", what, text),
    })
}

fn parse_node(token: usize, text: &str, n_nodes: u32) -> Result<u32, FormatError> {
    let node = parse_token::<u32>(token, text, "node")?;
    if node >= n_nodes {
        return Err(FormatError::Malformed {
            token,
            message: format!("node {} out of range for {} nodes", node, n_nodes),
        });
    }
    Ok(node)
}

fn parse_weight(token: usize, text: &str) -> Result<u32, FormatError> {
    let weight = parse_token::<f64>(token, text, "weight")?;
    if !weight.is_finite() || weight < 0.0 || weight.round() > u32::MAX as f64 {
        return Err(FormatError::Malformed {
            token,
            message: format!("weight {} is not a valid distance", weight),
        });
    }
    Ok(weight.round() as u32)
}

fn truncated(token: usize) -> FormatError {
    FormatError::Malformed {
        token,
        message: "incomplete edge triple".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rounds_weights() {
        let g = parse_raw_graph("3\n0 1 1.4\n1 2 2.5\n").unwrap();
        assert_eq!(g.size(), 3);
        assert_eq!(g.neighbors(0).get(&1), Some(&1));
        // Half away from zero
        assert_eq!(g.neighbors(2).get(&1), Some(&3));
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(matches!(
            parse_raw_graph(""),
            Err(FormatError::Malformed { token: 0, .. })
        ));
        assert!(matches!(
            parse_raw_graph("2\n0 1"),
            Err(FormatError::Malformed { token: 3, .. })
        ));
        assert!(matches!(
            parse_raw_graph("2\n0 5 1.0"),
            Err(FormatError::Malformed { token: 2, .. })
        ));
        assert!(parse_raw_graph("2\n0 1 -3").is_err());
        assert!(parse_raw_graph("2\n0 1 abc").is_err());
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tiny.raw");

        let mut g = Graph::new(4);
        g.add_edge(0, 1, 3);
        g.add_edge(2, 1, 4);
        g.add_edge(3, 0, 1);
        write_raw_graph(&path, &g).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "4\n0 1 3\n0 3 1\n1 2 4\n");

        let back = read_raw_graph(&path).unwrap();
        assert_eq!(back.num_edges(), 3);
        assert_eq!(back.neighbors(1).get(&2), Some(&4));
    }
}
