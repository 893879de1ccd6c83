use crate::{
    error::{Error, Result},
    merge::{Aggregator, MergeOptions},
    provenance::{Provenance, ReverseOptions},
    symbols::{Namespace, SymbolTable},
};

pub struct Session<N: Namespace = SymbolTable> {
    aggregator: Aggregator,
    namespace: N,
    options: MergeOptions,
    depth: usize,
    last: Option<Provenance>,
}

impl<N: Namespace> Session<N> {
    pub fn new(aggregator: Aggregator, namespace: N, options: MergeOptions) -> Self {
        Self {
            aggregator,
            namespace,
            options,
            depth: 0,
            last: None,
        }
    }

    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    pub fn namespace(&self) -> &N {
        &self.namespace
    }

    pub fn namespace_mut(&mut self) -> &mut N {
        &mut self.namespace
    }

    pub fn options_mut(&mut self) -> &mut MergeOptions {
        &mut self.options
    }

    /// The provenance of the aggregation currently applied, if any.
    pub fn last(&self) -> Option<&Provenance> {
        self.last.as_ref()
    }

    pub fn enter_scope(&mut self) {
        self.depth += 1;
    }

    pub fn exit_scope(&mut self) -> Result<()> {
        if self.depth == 0 {
            return Err(Error::Misuse("exit_scope() called at the top level".to_string()));
        }
        self.depth -= 1;
        Ok(())
    }

    /// Run `f` one scope deeper.
    pub fn nested<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        self.depth += 1;
        let out = f(self);
        self.depth -= 1;
        out
    }

    pub fn is_top_level(&self) -> bool {
        self.depth == 0
    }

    fn require_top_level(&self, op: &str) -> Result<()> {
        if self.is_top_level() {
            return Ok(());
        }
        Err(Error::Misuse(format!(
            "{op}() needs the top-level scope (current depth {}); pass the destination namespace to Aggregator::{} explicitly",
            self.depth,
            if op == "import_all" { "import_into" } else { "reverse" },
        )))
    }

    /// Aggregate into the top-level namespace. A previous aggregation is
    /// reversed first so changed options take full effect.
    pub fn import_all(&mut self) -> Result<&Provenance> {
        self.require_top_level("import_all")?;

        if let Some(previous) = self.last.take() {
            self.aggregator
                .reverse(&mut self.namespace, &previous, ReverseOptions::default());
        }

        let provenance = self.aggregator.import_into(&mut self.namespace, &self.options)?;
        Ok(&*self.last.insert(provenance))
    }

    /// Undo the last [`import_all`](Self::import_all).
    pub fn deimport_all(&mut self, options: ReverseOptions) -> Result<Vec<String>> {
        self.require_top_level("deimport_all")?;

        match self.last.take() {
            Some(previous) => Ok(self.aggregator.reverse(&mut self.namespace, &previous, options)),
            None => Ok(Vec::new()),
        }
    }
}
