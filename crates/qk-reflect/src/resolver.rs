//! Cross-module reference resolution.
//!
//! Modules that reach each other (directly or through a chain) cannot both
//! be loaded before the other. Imports inside such a strongly connected
//! component are turned into lazy imports; everything else stays eager so
//! the acyclic case keeps a plain load order.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use itertools::Itertools;
use qk_core::emit::{ImportKind, ModuleImport};
use qk_core::ir::{ClassDescriptor, QualifiedName};
use qk_core::Result;
use tracing::debug;

use crate::index::ProgramIndex;

/// Module dependency graph labelled with the symbols behind each edge.
#[derive(Debug, Clone, Default)]
pub struct ReferenceGraph {
    pub modules: Vec<QualifiedName>,
    edges: Vec<BTreeMap<usize, BTreeSet<QualifiedName>>>,
}

impl ReferenceGraph {
    pub fn build(index: &ProgramIndex<'_>) -> Result<Self> {
        let modules: Vec<QualifiedName> = index
            .program
            .modules
            .iter()
            .map(|module| module.name.clone())
            .collect();
        let positions: HashMap<&QualifiedName, usize> = modules
            .iter()
            .enumerate()
            .map(|(position, name)| (name, position))
            .collect();

        let mut edges = vec![BTreeMap::new(); modules.len()];
        for (from, module) in index.program.modules.iter().enumerate() {
            for class in &module.classes {
                for symbol in referenced_symbols(class) {
                    let Some(owner) = index.module_of(symbol) else {
                        continue;
                    };
                    let to = positions[owner];
                    if to == from {
                        continue;
                    }
                    edges[from]
                        .entry(to)
                        .or_insert_with(BTreeSet::new)
                        .insert(symbol.clone());
                }
            }
        }
        Ok(Self { modules, edges })
    }

    pub fn depends_on(&self, from: &QualifiedName, to: &QualifiedName) -> bool {
        match (self.position(from), self.position(to)) {
            (Some(from), Some(to)) => self.edges[from].contains_key(&to),
            _ => false,
        }
    }

    fn position(&self, name: &QualifiedName) -> Option<usize> {
        self.modules.iter().position(|module| module == name)
    }

    /// Strongly connected components (Tarjan), each listed in module order.
    pub fn components(&self) -> Vec<Vec<usize>> {
        let mut tarjan = Tarjan {
            graph: self,
            index: 0,
            indices: vec![None; self.modules.len()],
            lowlink: vec![0; self.modules.len()],
            on_stack: vec![false; self.modules.len()],
            stack: Vec::new(),
            components: Vec::new(),
        };
        for node in 0..self.modules.len() {
            if tarjan.indices[node].is_none() {
                tarjan.connect(node);
            }
        }
        let mut components = tarjan.components;
        for component in &mut components {
            component.sort_unstable();
        }
        components
    }
}

struct Tarjan<'g> {
    graph: &'g ReferenceGraph,
    index: usize,
    indices: Vec<Option<usize>>,
    lowlink: Vec<usize>,
    on_stack: Vec<bool>,
    stack: Vec<usize>,
    components: Vec<Vec<usize>>,
}

impl Tarjan<'_> {
    fn connect(&mut self, node: usize) {
        self.indices[node] = Some(self.index);
        self.lowlink[node] = self.index;
        self.index += 1;
        self.stack.push(node);
        self.on_stack[node] = true;

        let graph = self.graph;
        for &next in graph.edges[node].keys() {
            match self.indices[next] {
                None => {
                    self.connect(next);
                    self.lowlink[node] = self.lowlink[node].min(self.lowlink[next]);
                }
                Some(next_index) if self.on_stack[next] => {
                    self.lowlink[node] = self.lowlink[node].min(next_index);
                }
                Some(_) => {}
            }
        }

        if Some(self.lowlink[node]) == self.indices[node] {
            let mut component = Vec::new();
            while let Some(member) = self.stack.pop() {
                self.on_stack[member] = false;
                component.push(member);
                if member == node {
                    break;
                }
            }
            self.components.push(component);
        }
    }
}

fn referenced_symbols(class: &ClassDescriptor) -> Vec<&QualifiedName> {
    let mut symbols: Vec<&QualifiedName> = class.parents.iter().collect();
    for field in &class.fields {
        symbols.push(&field.ty);
        if let Some(class) = field.initializer.as_ref().and_then(|init| init.referenced_class()) {
            symbols.push(class);
        }
    }
    for method in &class.methods {
        symbols.push(&method.returns);
        symbols.extend(method.params.iter().map(|param| &param.ty));
    }
    symbols.extend(class.constructor.iter().map(|param| &param.ty));
    symbols
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedImports {
    pub imports: Vec<ModuleImport>,
    /// Module groups that reference each other; their mutual imports are lazy.
    pub cycles: Vec<Vec<QualifiedName>>,
}

impl ResolvedImports {
    pub fn for_module<'s>(&'s self, module: &'s QualifiedName) -> impl Iterator<Item = &'s ModuleImport> {
        self.imports.iter().filter(move |import| &import.from == module)
    }
}

pub fn resolve_references(index: &ProgramIndex<'_>) -> Result<ResolvedImports> {
    let graph = ReferenceGraph::build(index)?;
    let components = graph.components();

    let mut component_of = vec![0; graph.modules.len()];
    for (id, component) in components.iter().enumerate() {
        for &member in component {
            component_of[member] = id;
        }
    }
    let cycles = components
        .iter()
        .filter(|component| component.len() > 1)
        .map(|component| {
            component
                .iter()
                .map(|&member| graph.modules[member].clone())
                .collect_vec()
        })
        .sorted()
        .collect_vec();

    let mut imports = Vec::new();
    for (from, targets) in graph.edges.iter().enumerate() {
        for (&to, symbols) in targets {
            let cyclic = component_of[from] == component_of[to] && components[component_of[from]].len() > 1;
            imports.push(ModuleImport {
                from: graph.modules[from].clone(),
                target: graph.modules[to].clone(),
                kind: if cyclic {
                    ImportKind::Lazy
                } else {
                    ImportKind::Eager
                },
                symbols: symbols.iter().cloned().collect(),
            });
        }
    }

    debug!(
        "resolved {} imports, {} of them lazy, across {} cycles",
        imports.len(),
        imports.iter().filter(|import| import.kind == ImportKind::Lazy).count(),
        cycles.len()
    );
    Ok(ResolvedImports { imports, cycles })
}
