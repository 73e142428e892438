//! # Histórico Persistente — Cadeia de Ancestrais
//!
//! Cada caminho candidato do Viterbi é uma lista ligada *append-only* de
//! estados ocultos. Estender um caminho cria um único nó que aponta para o
//! anterior, então dois caminhos que divergiram no passo `k` compartilham
//! todos os nós até `k`:
//!
//! ```text
//!            ┌── B ── C     (ancestral 1)
//! BOS ── A ──┤
//!            └── A ── ∅     (ancestral 2, com um passo de skip)
//! ```
//!
//! Os nós vivem numa arena ([`HistoryArena`]) indexada por [`NodeId`]: nunca
//! são liberados individualmente nem mutados depois de criados, e a memória
//! inteira é devolvida de uma vez quando a sessão de decodificação termina.
//! Isso evita contagem de referências no laço quente de cada passo.

use std::fmt;

/// Índice de um nó dentro da [`HistoryArena`] que o criou.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// Posição do nó na arena.
    pub fn index(self) -> usize {
        self.0
    }
}

/// Nó imutável da cadeia. `payload == None` marca um passo de skip.
#[derive(Debug, Clone)]
struct ChainNode<S> {
    parent: Option<NodeId>,
    payload: Option<S>,
}

/// Arena *append-only* que guarda todos os nós de histórico de uma sessão.
#[derive(Debug, Clone)]
pub struct HistoryArena<S> {
    nodes: Vec<ChainNode<S>>,
}

impl<S> HistoryArena<S> {
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
        }
    }

    /// Número de nós já alocados (nunca diminui).
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Estende `parent` com `state` em O(1). `None` cria uma raiz.
    pub fn append(&mut self, parent: Option<NodeId>, state: S) -> NodeId {
        self.push(parent, Some(state))
    }

    /// Estende `parent` com um marcador de skip ("nenhuma informação neste passo").
    pub fn skip(&mut self, parent: NodeId) -> NodeId {
        self.push(Some(parent), None)
    }

    fn push(&mut self, parent: Option<NodeId>, payload: Option<S>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(ChainNode { parent, payload });
        id
    }

    /// Estado guardado no nó (`None` para skip).
    pub fn payload(&self, node: NodeId) -> Option<&S> {
        self.nodes[node.0].payload.as_ref()
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.0].parent
    }

    /// Número de entradas (incluindo skips) da raiz até `node`.
    pub fn depth(&self, node: NodeId) -> usize {
        self.walk(node).count()
    }

    /// Percorre a cadeia de `node` até a raiz, do mais recente ao mais antigo.
    pub fn walk(&self, node: NodeId) -> Walk<'_, S> {
        Walk {
            arena: self,
            next: Some(node),
        }
    }

    /// O `k`-ésimo estado mais recente que **não** é skip (`k = 0` é o mais novo).
    ///
    /// Usado pelos redutores de ordem ≥ 2 para pular marcadores de skip.
    pub fn nonnull_payload(&self, node: NodeId, k: usize) -> Option<&S> {
        self.walk(node).flatten().nth(k)
    }

    /// Visão somente-leitura do histórico terminado em `node`.
    pub fn lineage(&self, node: NodeId) -> Lineage<'_, S> {
        Lineage {
            arena: self,
            pending: None,
            node,
        }
    }

    /// Histórico completo da raiz até `node`, trocando cada skip por `skip_value`.
    pub fn history(&self, node: NodeId, skip_value: &S) -> Vec<S>
    where
        S: Clone,
    {
        let mut states: Vec<S> = self
            .walk(node)
            .map(|payload| payload.unwrap_or(skip_value).clone())
            .collect();
        states.reverse();
        states
    }
}

impl<S> Default for HistoryArena<S> {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterador da cadeia, do nó mais recente até a raiz.
pub struct Walk<'a, S> {
    arena: &'a HistoryArena<S>,
    next: Option<NodeId>,
}

impl<'a, S> Iterator for Walk<'a, S> {
    type Item = Option<&'a S>;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.next?;
        let node = &self.arena.nodes[id.0];
        self.next = node.parent;
        Some(node.payload.as_ref())
    }
}

/// Visão emprestada de um histórico, opcionalmente com um estado "pendente"
/// no topo que ainda não foi materializado na arena.
///
/// O decodificador usa o estado pendente para calcular a redução de um
/// descendente sobre o histórico **estendido** antes de decidir se ele
/// merece um nó próprio.
pub struct Lineage<'a, S> {
    arena: &'a HistoryArena<S>,
    pending: Option<&'a S>,
    node: NodeId,
}

impl<'a, S> Clone for Lineage<'a, S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'a, S> Copy for Lineage<'a, S> {}

impl<'a, S> Lineage<'a, S> {
    /// A mesma linhagem com `state` empilhado por cima.
    pub(crate) fn extended(self, state: &'a S) -> Self {
        Self {
            pending: Some(state),
            ..self
        }
    }

    /// Nó mais recente já materializado na arena.
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Estados não-skip, do mais recente ao mais antigo.
    pub fn nonnull_states(&self) -> impl Iterator<Item = &'a S> + 'a {
        self.pending
            .into_iter()
            .chain(self.arena.walk(self.node).flatten())
    }

    /// Ver [`HistoryArena::nonnull_payload`].
    pub fn nonnull_payload(&self, k: usize) -> Option<&'a S> {
        match (self.pending, k) {
            (Some(state), 0) => Some(state),
            (Some(_), k) => self.arena.nonnull_payload(self.node, k - 1),
            (None, k) => self.arena.nonnull_payload(self.node, k),
        }
    }

    /// Atalho para `nonnull_payload(0)`.
    pub fn most_recent(&self) -> Option<&'a S> {
        self.nonnull_payload(0)
    }
}

impl<'a, S: fmt::Debug> fmt::Debug for Lineage<'a, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lineage")
            .field("pending", &self.pending)
            .field("node", &self.node)
            .finish()
    }
}

/// Um caminho sobrevivente: log-probabilidade acumulada + ponta do histórico.
///
/// `Copy` e imutável. Guardar um `Ancestor` de um passo antigo é seguro: a
/// arena nunca reescreve os nós que ele referencia.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ancestor {
    log_probability: f64,
    history: NodeId,
}

impl Ancestor {
    pub fn new(log_probability: f64, history: NodeId) -> Self {
        Self {
            log_probability,
            history,
        }
    }

    /// Log10 da probabilidade acumulada do caminho.
    pub fn log_probability(&self) -> f64 {
        self.log_probability
    }

    /// Ponta do histórico deste caminho na arena.
    pub fn history(&self) -> NodeId {
        self.history
    }

    /// O mais provável entre `self` e `other`. Em empate exato mantém `self`.
    pub fn more_probable(self, other: Ancestor) -> Ancestor {
        if other.log_probability > self.log_probability {
            other
        } else {
            self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_shares_prefix() {
        let mut arena = HistoryArena::new();
        let root = arena.append(None, "BOS");
        let a = arena.append(Some(root), "A");
        let ab = arena.append(Some(a), "B");
        let aa = arena.append(Some(a), "A");

        // Quatro nós para dois caminhos de tamanho 3: o prefixo é compartilhado
        assert_eq!(arena.len(), 4);
        assert_eq!(arena.history(ab, &"?"), vec!["BOS", "A", "B"]);
        assert_eq!(arena.history(aa, &"?"), vec!["BOS", "A", "A"]);
        assert_eq!(arena.parent(ab), Some(a));
        assert_eq!(arena.depth(aa), 3);
    }

    #[test]
    fn test_skip_substitutes_placeholder() {
        let mut arena = HistoryArena::new();
        let root = arena.append(None, "BOS");
        let a = arena.append(Some(root), "A");
        let skipped = arena.skip(a);
        let c = arena.append(Some(skipped), "C");

        assert_eq!(arena.payload(skipped), None);
        assert_eq!(arena.history(c, &"_"), vec!["BOS", "A", "_", "C"]);
    }

    #[test]
    fn test_nonnull_payload_ignores_skips() {
        let mut arena = HistoryArena::new();
        let root = arena.append(None, 'x');
        let a = arena.append(Some(root), 'a');
        let s1 = arena.skip(a);
        let s2 = arena.skip(s1);
        let b = arena.append(Some(s2), 'b');
        let s3 = arena.skip(b);

        assert_eq!(arena.nonnull_payload(s3, 0), Some(&'b'));
        assert_eq!(arena.nonnull_payload(s3, 1), Some(&'a'));
        assert_eq!(arena.nonnull_payload(s3, 2), Some(&'x'));
        assert_eq!(arena.nonnull_payload(s3, 3), None);
    }

    #[test]
    fn test_lineage_pending_state() {
        let mut arena = HistoryArena::new();
        let root = arena.append(None, 1);
        let skipped = arena.skip(root);
        let next = 7;
        let lineage = arena.lineage(skipped).extended(&next);

        assert_eq!(lineage.most_recent(), Some(&7));
        assert_eq!(lineage.nonnull_payload(1), Some(&1));
        assert_eq!(lineage.nonnull_payload(2), None);
        assert_eq!(lineage.nonnull_states().copied().collect::<Vec<_>>(), vec![7, 1]);
        // A visão não aloca nada
        assert_eq!(arena.len(), 2);
    }

    #[test]
    fn test_more_probable_keeps_receiver_on_tie() {
        let mut arena = HistoryArena::new();
        let x = arena.append(None, 0);
        let y = arena.append(None, 1);
        let a = Ancestor::new(-1.0, x);
        let b = Ancestor::new(-1.0, y);
        let c = Ancestor::new(-0.5, y);

        assert_eq!(a.more_probable(b).history(), x);
        assert_eq!(a.more_probable(c), c);
        assert_eq!(c.more_probable(a), c);
    }
}
