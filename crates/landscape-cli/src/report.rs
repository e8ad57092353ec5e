//! Text output of the final population.
//!
//! Format 0 is a tidy table of selected mutations per chromosome. Format k
//! in `1..=N` prints the positions of k diploids followed by ms-style blocks
//! for their neutral and then selected variants; k = N reports everyone in
//! id order.

use std::collections::HashMap;
use std::io::Write;

use anyhow::{ensure, Result};
use landscape_core::rng::derive_stream_rng;
use landscape_core::{Diploid, Gamete, Mutation};

/// Stream reserved for choosing which diploids are reported.
const SAMPLING_STREAM: u64 = 2;

pub fn write_report<W: Write>(
    out: &mut W,
    population: &[Diploid],
    format: usize,
    seed: u64,
) -> Result<()> {
    let n = population.len();
    ensure!(
        format <= n,
        "output format {format} exceeds the population size ({n})"
    );
    if format == 0 {
        return write_tidy(out, population);
    }
    let sample = choose_sample(n, format, seed);
    write_sample(out, population, &sample)
}

/// Indices of the diploids to report: all of them in order when `k == n`,
/// otherwise `k` distinct indices drawn without replacement.
pub fn choose_sample(n: usize, k: usize, seed: u64) -> Vec<usize> {
    if k >= n {
        return (0..n).collect();
    }
    let mut rng = derive_stream_rng(seed, SAMPLING_STREAM);
    rand::seq::index::sample(&mut rng, n, k).into_vec()
}

fn write_tidy<W: Write>(out: &mut W, population: &[Diploid]) -> Result<()> {
    writeln!(out, "dip x y chrom pos s")?;
    for (i, diploid) in population.iter().enumerate() {
        let [x, y] = diploid.record.position;
        for (chrom, gamete) in diploid.gametes.iter().enumerate() {
            let mut any = false;
            for m in gamete.selected() {
                writeln!(out, "{i} {x} {y} {chrom} {} {}", m.position, m.selection)?;
                any = true;
            }
            if !any {
                writeln!(out, "{i} {x} {y} {chrom} NA NA")?;
            }
        }
    }
    Ok(())
}

fn write_sample<W: Write>(out: &mut W, population: &[Diploid], sample: &[usize]) -> Result<()> {
    for &i in sample {
        let [x, y] = population[i].record.position;
        writeln!(out, "{x} {y}")?;
    }
    let gametes: Vec<&Gamete> = sample
        .iter()
        .flat_map(|&i| population[i].gametes.iter())
        .collect();
    write_ms_block(out, &gametes, |m| m.neutral)?;
    writeln!(out)?;
    write_ms_block(out, &gametes, |m| !m.neutral)?;
    Ok(())
}

/// One ms block over `gametes`, restricted to mutations accepted by `keep`.
/// Sites present in every sampled gamete are left out.
fn write_ms_block<W: Write>(
    out: &mut W,
    gametes: &[&Gamete],
    keep: impl Fn(&Mutation) -> bool,
) -> Result<()> {
    let mut counts: HashMap<u64, (f64, usize)> = HashMap::new();
    for m in gametes
        .iter()
        .flat_map(|g| g.mutations())
        .filter(|m| keep(m))
    {
        counts.entry(m.site_key()).or_insert((m.position, 0)).1 += 1;
    }
    let mut sites: Vec<f64> = counts
        .into_values()
        .filter(|&(_, c)| c < gametes.len())
        .map(|(position, _)| position)
        .collect();
    sites.sort_by(f64::total_cmp);

    writeln!(out, "//")?;
    writeln!(out, "segsites: {}", sites.len())?;
    if sites.is_empty() {
        return Ok(());
    }
    let positions: Vec<String> = sites.iter().map(|p| format!("{p:.6}")).collect();
    writeln!(out, "positions: {}", positions.join(" "))?;
    for gamete in gametes {
        let row: String = sites
            .iter()
            .map(|&p| {
                let carried = gamete
                    .mutations()
                    .iter()
                    .any(|m| keep(m) && m.position == p);
                if carried {
                    '1'
                } else {
                    '0'
                }
            })
            .collect();
        writeln!(out, "{row}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use landscape_core::PositionRecord;

    fn mutation(position: f64, neutral: bool) -> Mutation {
        Mutation {
            position,
            selection: if neutral { 0.0 } else { 0.02 },
            dominance: 1.0,
            origin: 0,
            neutral,
        }
    }

    fn population() -> Vec<Diploid> {
        vec![
            Diploid {
                gametes: [
                    Gamete::from_mutations(vec![mutation(0.25, false), mutation(0.5, true)]),
                    Gamete::new(),
                ],
                record: PositionRecord::new(0, [0.1, 0.9]),
            },
            Diploid {
                gametes: [
                    Gamete::from_mutations(vec![mutation(0.5, true)]),
                    Gamete::from_mutations(vec![mutation(0.75, true)]),
                ],
                record: PositionRecord::new(1, [0.8, 0.2]),
            },
        ]
    }

    fn render(format: usize) -> Result<String> {
        let mut buf = Vec::new();
        write_report(&mut buf, &population(), format, 11)?;
        Ok(String::from_utf8(buf)?)
    }

    #[test]
    fn tidy_lists_selected_mutations_per_chromosome() {
        let text = render(0).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "dip x y chrom pos s",
                "0 0.1 0.9 0 0.25 0.02",
                "0 0.1 0.9 1 NA NA",
                "1 0.8 0.2 0 NA NA",
                "1 0.8 0.2 1 NA NA",
            ]
        );
    }

    #[test]
    fn whole_population_sample_prints_positions_then_blocks() {
        let text = render(2).unwrap();
        let expected = "\
0.1 0.9
0.8 0.2
//
segsites: 2
positions: 0.500000 0.750000
10
00
10
01

//
segsites: 1
positions: 0.250000
1
0
0
0
";
        assert_eq!(text, expected);
    }

    #[test]
    fn sites_fixed_in_the_sample_are_dropped() {
        let shared = mutation(0.3, true);
        let pop = vec![Diploid {
            gametes: [
                Gamete::from_mutations(vec![shared]),
                Gamete::from_mutations(vec![shared]),
            ],
            record: PositionRecord::new(0, [0.5, 0.5]),
        }];
        let mut buf = Vec::new();
        write_report(&mut buf, &pop, 1, 0).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text, "0.5 0.5\n//\nsegsites: 0\n\n//\nsegsites: 0\n");
    }

    #[test]
    fn format_larger_than_population_is_rejected() {
        let err = render(3).unwrap_err();
        assert!(err.to_string().contains("exceeds the population size"));
    }

    #[test]
    fn partial_sample_is_distinct_and_reproducible() {
        let a = choose_sample(100, 10, 5);
        let b = choose_sample(100, 10, 5);
        assert_eq!(a, b);
        let mut sorted = a.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), 10);
        assert!(a.iter().all(|&i| i < 100));
    }
}
