//! # Funções de Redução
//!
//! Uma redução resume o histórico recente de um caminho na **menor chave**
//! suficiente para consultar o modelo de transição:
//!
//! | Ordem | Redutor         | Chave                                 |
//! |-------|-----------------|---------------------------------------|
//! | 1     | [`MostRecent`]  | último estado                         |
//! | 2     | [`RecentPair`]  | par (penúltimo, último), via função   |
//! | N     | [`RecentStates`]| `Vec` dos N últimos, do mais antigo   |
//!
//! Marcadores de skip nunca entram na chave: todos os redutores leem apenas
//! estados não-skip através de [`Lineage`].
//!
//! Dois caminhos com a mesma chave são indistinguíveis para todas as
//! transições futuras, e é isso que permite ao decodificador manter só o
//! melhor de cada chave sem perder exatidão.

use std::hash::Hash;
use std::marker::PhantomData;

use crate::history::Lineage;

/// Mapeia um histórico para a chave usada pelo modelo de transição.
pub trait Reducer<S> {
    type Key: Eq + Hash + Clone;

    /// Quantos estados não-skip o redutor precisa para produzir uma chave.
    fn order(&self) -> usize;

    /// Chave do histórico, ou `None` se ele for curto demais.
    fn reduce(&self, lineage: &Lineage<'_, S>) -> Option<Self::Key>;
}

/// Redutor de primeira ordem: a chave é o último estado.
#[derive(Debug, Clone, Copy, Default)]
pub struct MostRecent;

impl<S: Eq + Hash + Clone> Reducer<S> for MostRecent {
    type Key = S;

    fn order(&self) -> usize {
        1
    }

    fn reduce(&self, lineage: &Lineage<'_, S>) -> Option<S> {
        lineage.most_recent().cloned()
    }
}

/// Redutor de segunda ordem: combina (penúltimo, último) com uma função do
/// chamador, ex: `|a, b| (*a, *b)` ou um construtor de bigrama do domínio.
pub struct RecentPair<F, R> {
    pairing: F,
    _key: PhantomData<fn() -> R>,
}

impl<F, R> RecentPair<F, R> {
    pub fn new(pairing: F) -> Self {
        Self {
            pairing,
            _key: PhantomData,
        }
    }
}

impl<S, F, R> Reducer<S> for RecentPair<F, R>
where
    F: Fn(&S, &S) -> R,
    R: Eq + Hash + Clone,
{
    type Key = R;

    fn order(&self) -> usize {
        2
    }

    fn reduce(&self, lineage: &Lineage<'_, S>) -> Option<R> {
        let newest = lineage.nonnull_payload(0)?;
        let previous = lineage.nonnull_payload(1)?;
        Some((self.pairing)(previous, newest))
    }
}

/// Redutor de ordem N: os N últimos estados não-skip, do mais antigo ao mais novo.
#[derive(Debug, Clone, Copy)]
pub struct RecentStates {
    order: usize,
}

impl RecentStates {
    /// Ordem 0 é rejeitada na construção do [`Viterbi`](crate::viterbi::Viterbi).
    pub fn new(order: usize) -> Self {
        Self { order }
    }
}

impl<S: Eq + Hash + Clone> Reducer<S> for RecentStates {
    type Key = Vec<S>;

    fn order(&self) -> usize {
        self.order
    }

    fn reduce(&self, lineage: &Lineage<'_, S>) -> Option<Vec<S>> {
        let mut key: Vec<S> = lineage
            .nonnull_states()
            .take(self.order)
            .cloned()
            .collect();
        if key.len() < self.order {
            return None;
        }
        key.reverse();
        Some(key)
    }
}
