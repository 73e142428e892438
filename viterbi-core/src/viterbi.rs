//! # Algoritmo de Viterbi — Decodificação de Ordem Generalizada
//!
//! O algoritmo de Viterbi é um método de **programação dinâmica** que encontra
//! a sequência de estados ocultos mais provável dadas as observações.
//!
//! ## Intuição
//!
//! Em vez de uma tabela `N × T` fixa, o decodificador mantém uma **fronteira**:
//! um caminho sobrevivente por **chave de redução** (o último estado na
//! ordem 1, o último par na ordem 2, ...). Dois caminhos com a mesma chave são
//! indistinguíveis para todas as transições futuras, então só o mais provável
//! pode fazer parte da resposta ótima: descartar os outros é poda exata, não
//! heurística.
//!
//! ## Algoritmo
//!
//! ```text
//! Inicialização: fronteira = { redução(sementes) → log P = 0 }
//!
//! Passo (y):     para cada ancestral a e candidato c de emissão(y):
//!                  log P(a·c) = log P(a) + trans(redução(a), c) + emis(c, y)
//!                fronteira' = argmax por redução(a·c), descartando -∞
//!                se fronteira' = ∅: cada ancestral ganha um skip (∅)
//!
//! Fim:           argmax_a [log P(a) + trans(redução(a), terminal)]
//! ```
//!
//! Os históricos vivem numa [`HistoryArena`] compartilhada, então cada passo
//! aloca no máximo um nó por chave sobrevivente.

use std::collections::HashMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::config::{DecoderConfig, DEFAULT_MIN_BEAM_FRONTIER};
use crate::error::{DecoderError, Result};
use crate::history::{Ancestor, HistoryArena};
use crate::model::{Candidate, EmissionProbabilityModel, TransitionProbabilityModel};
use crate::reduction::{MostRecent, RecentPair, RecentStates, Reducer};

/// Resultado de um [`Viterbi::advance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepOutcome {
    /// Pelo menos um candidato foi viável; a fronteira foi substituída.
    Extended { frontier_len: usize },
    /// Nenhum candidato viável: todos os ancestrais ganharam um skip.
    Skipped { frontier_len: usize },
}

/// Melhor caminho devolvido por [`Viterbi::end`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decoding<S> {
    /// Um estado por chamada de `advance`; passos de skip trazem o placeholder.
    pub states: Vec<S>,
    /// log10 da probabilidade do caminho (inclui a transição terminal se `terminated`).
    pub log_probability: f64,
    /// `false` quando nenhum caminho alcançava o estado terminal e o
    /// vencedor foi escolhido ignorando a terminação.
    pub terminated: bool,
}

/// Fotografia da fronteira em um passo (para visualização passo a passo).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrontierSnapshot<R> {
    /// Número de `advance` já executados
    pub step: usize,
    pub entries: Vec<FrontierEntry<R>>,
    /// Score do melhor caminho até aqui
    pub best_log_probability: f64,
}

/// Um caminho sobrevivente da fronteira.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrontierEntry<R> {
    pub reduction: R,
    pub log_probability: f64,
}

impl<R> FrontierSnapshot<R> {
    /// Probabilidades relativas (softmax em base 10) dos caminhos da fronteira.
    pub fn relative_probabilities(&self) -> Vec<f64> {
        if self.entries.is_empty() {
            return vec![];
        }
        let max = self.best_log_probability;
        let weights: Vec<f64> = self
            .entries
            .iter()
            .map(|e| 10f64.powf(e.log_probability - max))
            .collect();
        let sum: f64 = weights.iter().sum();
        if sum == 0.0 || !sum.is_finite() {
            return vec![1.0 / self.entries.len() as f64; self.entries.len()];
        }
        weights.iter().map(|w| w / sum).collect()
    }
}

/// Descendente pontuado, ainda não materializado na arena.
#[derive(Debug, Clone, Copy)]
struct Scored {
    parent: usize,
    candidate: usize,
    log_probability: f64,
}

/// Decodificador de Viterbi sobre estados `S`, com redutor `K`.
///
/// Ciclo de vida: construção → `advance`* (com `beam_filter` opcional) →
/// `end`. `end` consome o decodificador, então uma sessão encerrada não pode
/// ser reutilizada.
pub struct Viterbi<S, E, T, K: Reducer<S>> {
    emission: E,
    transition: T,
    reducer: K,
    arena: HistoryArena<S>,
    /// Uma entrada por chave de redução, em ordem de inserção.
    frontier: Vec<(K::Key, Ancestor)>,
    seed_len: usize,
    steps: usize,
    min_beam_frontier: usize,
}

impl<S, E, T> Viterbi<S, E, T, MostRecent>
where
    S: Eq + std::hash::Hash + Clone,
{
    /// Decodificador de primeira ordem: a transição depende só do último estado.
    pub fn first_order<I>(emission: E, transition: T, seeds: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
    {
        Self::with_reducer(emission, transition, MostRecent, seeds)
    }
}

impl<S, E, T, F, R> Viterbi<S, E, T, RecentPair<F, R>>
where
    S: Clone,
    F: Fn(&S, &S) -> R,
    R: Eq + std::hash::Hash + Clone,
{
    /// Decodificador de segunda ordem. `pairing(penúltimo, último)` constrói
    /// a chave passada ao modelo de transição; exige dois estados iniciais.
    pub fn second_order<I>(emission: E, transition: T, pairing: F, seeds: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
    {
        Self::with_reducer(emission, transition, RecentPair::new(pairing), seeds)
    }
}

impl<S, E, T> Viterbi<S, E, T, RecentStates>
where
    S: Eq + std::hash::Hash + Clone,
{
    /// Decodificador de ordem `order`, com chave `Vec<S>` dos últimos estados.
    pub fn nth_order<I>(emission: E, transition: T, order: usize, seeds: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
    {
        Self::with_reducer(emission, transition, RecentStates::new(order), seeds)
    }
}

impl<S, E, T, K> Viterbi<S, E, T, K>
where
    S: Clone,
    K: Reducer<S>,
{
    /// Construtor geral com um redutor qualquer.
    ///
    /// As sementes formam o prefixo de todos os históricos, com
    /// log-probabilidade 0, e não aparecem no resultado de [`end`](Self::end).
    /// Um redutor de ordem 0 é rejeitado com [`DecoderError::InvalidOrder`].
    pub fn with_reducer<I>(emission: E, transition: T, reducer: K, seeds: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
    {
        if reducer.order() == 0 {
            return Err(DecoderError::InvalidOrder(0));
        }
        let mut arena = HistoryArena::new();
        let mut tip = None;
        let mut seed_len = 0;
        for seed in seeds {
            tip = Some(arena.append(tip, seed));
            seed_len += 1;
        }
        let tip = tip.ok_or(DecoderError::NoInitialState)?;
        let key = reducer
            .reduce(&arena.lineage(tip))
            .ok_or(DecoderError::InsufficientSeeds {
                required: reducer.order(),
                supplied: seed_len,
            })?;

        debug!(seeds = seed_len, order = reducer.order(), "sessão de Viterbi iniciada");

        Ok(Self {
            emission,
            transition,
            reducer,
            arena,
            frontier: vec![(key, Ancestor::new(0.0, tip))],
            seed_len,
            steps: 0,
            min_beam_frontier: DEFAULT_MIN_BEAM_FRONTIER,
        })
    }

    /// Fronteiras menores que `min` são ignoradas pelo [`beam_filter`](Self::beam_filter).
    pub fn with_min_beam_frontier(mut self, min: usize) -> Self {
        self.min_beam_frontier = min;
        self
    }

    pub fn frontier_len(&self) -> usize {
        self.frontier.len()
    }

    /// Número de `advance` concluídos.
    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn arena(&self) -> &HistoryArena<S> {
        &self.arena
    }

    /// Caminhos sobreviventes, em ordem determinística.
    pub fn frontier(&self) -> impl Iterator<Item = (&K::Key, &Ancestor)> {
        self.frontier.iter().map(|(key, ancestor)| (key, ancestor))
    }

    /// Ancestral de maior log-probabilidade (sem considerar a terminação).
    pub fn best(&self) -> Option<Ancestor> {
        self.frontier
            .iter()
            .map(|(_, ancestor)| *ancestor)
            .reduce(Ancestor::more_probable)
    }

    /// Histórico (sem as sementes) de um ancestral desta sessão.
    ///
    /// Válido para ancestrais obtidos em qualquer passo anterior: a arena
    /// nunca reescreve nós.
    pub fn history_of(&self, ancestor: &Ancestor, skip_value: &S) -> Vec<S> {
        let mut states = self.arena.history(ancestor.history(), skip_value);
        let seeds = self.seed_len.min(states.len());
        states.drain(..seeds);
        states
    }

    /// Fotografia serializável da fronteira corrente.
    pub fn snapshot(&self) -> FrontierSnapshot<K::Key> {
        let entries: Vec<FrontierEntry<K::Key>> = self
            .frontier
            .iter()
            .map(|(key, ancestor)| FrontierEntry {
                reduction: key.clone(),
                log_probability: ancestor.log_probability(),
            })
            .collect();
        FrontierSnapshot {
            step: self.steps,
            best_log_probability: self
                .best()
                .map_or(f64::NEG_INFINITY, |a| a.log_probability()),
            entries,
        }
    }

    /// Consome uma observação e substitui a fronteira.
    ///
    /// Se nenhum candidato for viável a partir de nenhum ancestral, a fronteira
    /// antiga sobrevive com um skip no histórico ([`StepOutcome::Skipped`]).
    /// Um `NaN` vindo de um modelo é rejeitado sem alterar a fronteira.
    pub fn advance<Y>(&mut self, observation: &Y) -> Result<StepOutcome>
    where
        Y: ?Sized,
        E: EmissionProbabilityModel<S, Y>,
        T: TransitionProbabilityModel<S, K::Key>,
    {
        let candidates = self.emission.candidates(observation);
        let mut scored = Vec::with_capacity(self.frontier.len() * candidates.len());
        for (parent, (key, ancestor)) in self.frontier.iter().enumerate() {
            score_row(
                &self.transition,
                self.steps,
                parent,
                key,
                ancestor,
                &candidates,
                &mut scored,
            )?;
        }
        Ok(self.commit(&candidates, scored))
    }

    /// Igual a [`advance`](Self::advance), mas pontua o leque
    /// (ancestral × candidato) em paralelo com rayon.
    ///
    /// O agrupamento por redução continua sequencial e na mesma ordem, então
    /// o resultado é idêntico ao de `advance`.
    pub fn par_advance<Y>(&mut self, observation: &Y) -> Result<StepOutcome>
    where
        Y: ?Sized,
        E: EmissionProbabilityModel<S, Y>,
        T: TransitionProbabilityModel<S, K::Key> + Sync,
        S: Sync,
        K::Key: Sync,
    {
        let candidates = self.emission.candidates(observation);
        let transition = &self.transition;
        let step = self.steps;
        let rows: Vec<Vec<Scored>> = self
            .frontier
            .par_iter()
            .enumerate()
            .map(|(parent, (key, ancestor))| -> Result<Vec<Scored>> {
                let mut row = Vec::with_capacity(candidates.len());
                score_row(transition, step, parent, key, ancestor, &candidates, &mut row)?;
                Ok(row)
            })
            .collect::<Result<Vec<_>>>()?;
        let scored = rows.into_iter().flatten().collect();
        Ok(self.commit(&candidates, scored))
    }

    /// Agrupa os descendentes pela redução do histórico estendido, mantendo o
    /// melhor de cada chave, e materializa só os vencedores.
    ///
    /// Em empate vence o primeiro descendente visto: ancestrais na ordem da
    /// fronteira, candidatos na ordem devolvida pelo modelo de emissão.
    /// Descendentes sem chave são descartados com um `warn!`.
    fn commit(&mut self, candidates: &[Candidate<S>], scored: Vec<Scored>) -> StepOutcome {
        let step = self.steps;
        self.steps += 1;

        let mut index: HashMap<K::Key, usize> = HashMap::new();
        let mut winners: Vec<(K::Key, Scored)> = Vec::new();
        let mut unreduced = 0usize;
        for descendant in scored {
            let parent = self.frontier[descendant.parent].1;
            let state = &candidates[descendant.candidate].state;
            let lineage = self.arena.lineage(parent.history()).extended(state);
            let Some(key) = self.reducer.reduce(&lineage) else {
                unreduced += 1;
                continue;
            };
            match index.get(&key) {
                Some(&slot) => {
                    if descendant.log_probability > winners[slot].1.log_probability {
                        winners[slot].1 = descendant;
                    }
                }
                None => {
                    index.insert(key.clone(), winners.len());
                    winners.push((key, descendant));
                }
            }
        }

        if unreduced > 0 {
            warn!(step, unreduced, "redutor não produziu chave; descendentes descartados");
        }

        if winners.is_empty() {
            for (_, ancestor) in self.frontier.iter_mut() {
                let node = self.arena.skip(ancestor.history());
                *ancestor = Ancestor::new(ancestor.log_probability(), node);
            }
            debug!(step, frontier = self.frontier.len(), "nenhum candidato viável, passo marcado como skip");
            return StepOutcome::Skipped {
                frontier_len: self.frontier.len(),
            };
        }

        let next: Vec<(K::Key, Ancestor)> = winners
            .into_iter()
            .map(|(key, descendant)| {
                let parent = self.frontier[descendant.parent].1;
                let state = candidates[descendant.candidate].state.clone();
                let node = self.arena.append(Some(parent.history()), state);
                (key, Ancestor::new(descendant.log_probability, node))
            })
            .collect();
        self.frontier = next;

        trace!(
            step,
            candidates = candidates.len(),
            frontier = self.frontier.len(),
            "passo do Viterbi concluído"
        );
        StepOutcome::Extended {
            frontier_len: self.frontier.len(),
        }
    }

    /// Poda de beam: remove caminhos com `log P < max - beam_threshold`.
    ///
    /// Não faz nada se a fronteira tiver menos de `min_beam_frontier` (10 por
    /// padrão) caminhos. O melhor caminho sempre sobrevive. Devolve quantos
    /// caminhos foram removidos.
    pub fn beam_filter(&mut self, beam_threshold: f64) -> Result<usize> {
        if beam_threshold.is_nan() || beam_threshold < 0.0 {
            return Err(DecoderError::InvalidBeamThreshold(beam_threshold));
        }
        if self.frontier.len() < self.min_beam_frontier {
            return Ok(0);
        }

        let max = self
            .frontier
            .iter()
            .map(|(_, ancestor)| ancestor.log_probability())
            .fold(f64::NEG_INFINITY, f64::max);
        let bound = max - beam_threshold;
        if bound.is_nan() {
            return Ok(0);
        }

        let before = self.frontier.len();
        self.frontier
            .retain(|(_, ancestor)| ancestor.log_probability() >= bound);
        assert!(
            !self.frontier.is_empty(),
            "beam filter esvaziou a fronteira (max = {max}, limiar = {beam_threshold})"
        );

        let removed = before - self.frontier.len();
        trace!(step = self.steps, removed, kept = self.frontier.len(), "beam filter aplicado");
        Ok(removed)
    }

    /// Encerra a decodificação e devolve o melhor caminho.
    ///
    /// Cada ancestral recebe a transição para `terminal_value` (em log, como
    /// qualquer outro passo). Se nenhum tiver score terminal finito, vence o
    /// de maior log-probabilidade ignorando a terminação. Um score terminal
    /// `NaN` é rejeitado com [`DecoderError::NotANumber`].
    pub fn end(self, skip_value: &S, terminal_value: &S) -> Result<Decoding<S>>
    where
        T: TransitionProbabilityModel<S, K::Key>,
    {
        if self.frontier.is_empty() {
            return Err(DecoderError::EmptyFrontier);
        }

        let mut terminated: Option<(Ancestor, f64)> = None;
        for (key, ancestor) in &self.frontier {
            let score = ancestor.log_probability()
                + self.transition.transition_log_probability(key, terminal_value);
            if score.is_nan() {
                return Err(DecoderError::NotANumber { step: self.steps });
            }
            if !score.is_finite() {
                continue;
            }
            if terminated.map_or(true, |(_, best)| score > best) {
                terminated = Some((*ancestor, score));
            }
        }

        let decoding = match terminated {
            Some((winner, score)) => {
                debug!(steps = self.steps, log_probability = score, "decodificação concluída");
                Decoding {
                    states: self.history_of(&winner, skip_value),
                    log_probability: score,
                    terminated: true,
                }
            }
            None => {
                let winner = self.best().ok_or(DecoderError::EmptyFrontier)?;
                warn!(
                    steps = self.steps,
                    log_probability = winner.log_probability(),
                    "nenhum caminho alcança o estado terminal; usando o melhor sem terminação"
                );
                Decoding {
                    states: self.history_of(&winner, skip_value),
                    log_probability: winner.log_probability(),
                    terminated: false,
                }
            }
        };
        Ok(decoding)
    }
}

/// Pontua todos os candidatos a partir de um ancestral.
///
/// Descendentes com `-∞` são descartados aqui: nunca venceriam um argmax futuro.
fn score_row<S, R, T>(
    transition: &T,
    step: usize,
    parent: usize,
    key: &R,
    ancestor: &Ancestor,
    candidates: &[Candidate<S>],
    out: &mut Vec<Scored>,
) -> Result<()>
where
    T: TransitionProbabilityModel<S, R>,
{
    for (index, candidate) in candidates.iter().enumerate() {
        let log_probability = ancestor.log_probability()
            + transition.transition_log_probability(key, &candidate.state)
            + candidate.emission_log_probability;
        if log_probability.is_nan() {
            return Err(DecoderError::NotANumber { step });
        }
        if log_probability == f64::NEG_INFINITY {
            continue;
        }
        out.push(Scored {
            parent,
            candidate: index,
            log_probability,
        });
    }
    Ok(())
}

/// Decodifica uma sequência inteira de observações.
///
/// Aplica `advance` (ou `par_advance` se `config.parallel`) a cada
/// observação, o beam filter depois de cada passo quando
/// `config.beam_threshold` está definido, e por fim `end`.
pub fn decode<'o, S, E, T, K, Y, I>(
    viterbi: Viterbi<S, E, T, K>,
    observations: I,
    config: &DecoderConfig,
    skip_value: &S,
    terminal_value: &S,
) -> Result<Decoding<S>>
where
    S: Clone + Sync,
    K: Reducer<S>,
    K::Key: Sync,
    E: EmissionProbabilityModel<S, Y>,
    T: TransitionProbabilityModel<S, K::Key> + Sync,
    Y: ?Sized + 'o,
    I: IntoIterator<Item = &'o Y>,
{
    let parallel = config.parallel;
    run(viterbi, observations, config, skip_value, terminal_value, |viterbi, observation| {
        if parallel {
            viterbi.par_advance(observation)
        } else {
            viterbi.advance(observation)
        }
    })
}

/// Como [`decode`], mas sempre com `advance`: aceita estados, chaves e
/// modelos que não são `Sync` (ex: com `RefCell`). `config.parallel` é ignorado.
pub fn decode_sequential<'o, S, E, T, K, Y, I>(
    viterbi: Viterbi<S, E, T, K>,
    observations: I,
    config: &DecoderConfig,
    skip_value: &S,
    terminal_value: &S,
) -> Result<Decoding<S>>
where
    S: Clone,
    K: Reducer<S>,
    E: EmissionProbabilityModel<S, Y>,
    T: TransitionProbabilityModel<S, K::Key>,
    Y: ?Sized + 'o,
    I: IntoIterator<Item = &'o Y>,
{
    run(viterbi, observations, config, skip_value, terminal_value, |viterbi, observation| {
        viterbi.advance(observation)
    })
}

fn run<'o, S, E, T, K, Y, I, F>(
    viterbi: Viterbi<S, E, T, K>,
    observations: I,
    config: &DecoderConfig,
    skip_value: &S,
    terminal_value: &S,
    mut step: F,
) -> Result<Decoding<S>>
where
    S: Clone,
    K: Reducer<S>,
    T: TransitionProbabilityModel<S, K::Key>,
    Y: ?Sized + 'o,
    I: IntoIterator<Item = &'o Y>,
    F: FnMut(&mut Viterbi<S, E, T, K>, &Y) -> Result<StepOutcome>,
{
    let mut viterbi = viterbi.with_min_beam_frontier(config.min_beam_frontier);
    for observation in observations {
        step(&mut viterbi, observation)?;
        if let Some(threshold) = config.beam_threshold {
            viterbi.beam_filter(threshold)?;
        }
    }
    viterbi.end(skip_value, terminal_value)
}
