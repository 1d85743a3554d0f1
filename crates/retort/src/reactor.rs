//! Execution of reaction schemas against concrete reactants: validation,
//! reordering, template instantiation, provenance annotation, sanitization

use ahash::{HashMap, HashMapExt, HashSet, HashSetExt};
use itertools::Itertools;
use molgraph::substructure::{self, Match};
use molgraph::{Atom, AtomId, Bond, BondOrder, Molecule, SanitizeLevel, element, sanitize};

use crate::errors::{Result, RetortError};
use crate::fragment::FragmentationStrategy;
use crate::schema::ReactionSchema;

#[derive(Copy, Clone, Debug)]
pub struct ReactOptions {
    /// How many template-match combinations to instantiate
    pub repetitions: usize,
    /// Keep the templates' atom-map numbers on product atoms
    pub keep_map_labels: bool,
    pub sanitize: SanitizeLevel,
}

impl Default for ReactOptions {
    fn default() -> Self {
        Self {
            repetitions: 1,
            keep_map_labels: true,
            sanitize: SanitizeLevel::Full,
        }
    }
}

/// Executes a reaction schema over collections of reactant molecules.
/// Reactants are matched to template slots in whatever order fits, so
/// callers never need to pre-sort them.
#[derive(Clone, Debug)]
pub struct Reactor {
    schema: ReactionSchema,
}

impl Reactor {
    #[must_use]
    pub fn new(schema: ReactionSchema) -> Self {
        Self { schema }
    }

    #[must_use]
    pub fn schema(&self) -> &ReactionSchema {
        &self.schema
    }

    /// Run the reaction once over `reactants`, producing annotated, sanitized
    /// products. The inputs are copied before any labeling, so caller-held
    /// molecules are never touched.
    pub fn react(&self, reactants: &[Molecule], options: &ReactOptions) -> Result<Vec<Molecule>> {
        // A counting check is far cheaper than the ordering search, so it
        // runs first and turns pool-size mistakes into a crisp error
        let required = self.schema.reactant_count();
        if reactants.len() != required {
            return Err(RetortError::ReactantCount {
                required,
                provided: reactants.len(),
            });
        }

        let Some(ordering) = self.schema.first_reactant_ordering(reactants, false) else {
            return Err(RetortError::ReactantMismatch);
        };

        // Copies get per-atom provenance labels; the originals stay pristine
        let ordered: Vec<Molecule> = ordering
            .iter()
            .enumerate()
            .map(|(slot, &index)| {
                let mut copy = reactants[index].clone();
                for id in copy.atoms().collect::<Vec<_>>() {
                    copy.atom_mut(id).source_reactant = Some(slot);
                }
                copy
            })
            .collect();

        let matches_per_slot: Vec<Vec<Match>> = self
            .schema
            .reactants()
            .iter()
            .zip(&ordered)
            .map(|(template, reactant)| substructure::find_matches(reactant, template))
            .collect();

        let mut products = Vec::new();
        for combination in matches_per_slot
            .iter()
            .multi_cartesian_product()
            .take(options.repetitions)
        {
            products.extend(self.instantiate(&ordered, &combination));
        }

        for product in &mut products {
            if !options.keep_map_labels {
                product.clear_map_nums();
            }
            // An unsanitized product is unsafe downstream; failures propagate
            sanitize::sanitize(product, options.sanitize)?;
        }
        Ok(products)
    }

    /// Instantiate every product template for one fixed choice of matches.
    /// Mapped template atoms copy their matched reactant atom, unmatched
    /// reactant atoms follow their nearest anchor, and matched atoms whose
    /// map number has no product home are left behind as leaving groups.
    fn instantiate(&self, ordered: &[Molecule], matches: &[&Match]) -> Vec<Molecule> {
        let schema = &self.schema;

        let matched_sets: Vec<HashSet<AtomId>> =
            matches.iter().map(|m| m.matched_atoms()).collect();

        // map number -> the concrete reactant atom it matched
        let mut atom_of_map: HashMap<u32, (usize, AtomId)> = HashMap::new();
        for (slot, template) in schema.reactants().iter().enumerate() {
            for (position, t_atom) in template.atoms().enumerate() {
                let map_num = template.atom(t_atom).map_num;
                if map_num != 0 {
                    atom_of_map.insert(map_num, (slot, matches[slot].mapping[position]));
                }
            }
        }

        // Unmatched reactant atoms may be reachable from anchors in several
        // products; whoever claims one first keeps it
        let mut claimed: HashSet<(usize, AtomId)> = HashSet::new();

        let mut outputs = Vec::new();
        for (product_index, template) in schema.products().iter().enumerate() {
            let info = schema.product_info(product_index);
            let mut product = Molecule::new();
            // (slot, reactant atom) -> product atom, for anchors and carried
            // substituents alike
            let mut placed: HashMap<(usize, AtomId), AtomId> = HashMap::new();
            let mut image_of_template: Vec<AtomId> = Vec::new();

            // Template atoms first: mapped ones inherit their matched
            // reactant atom, unmapped ones appear fresh
            for t_atom in template.atoms() {
                let query = template.atom(t_atom);
                let anchor = (query.map_num != 0)
                    .then(|| atom_of_map.get(&query.map_num))
                    .flatten();
                let id = match anchor {
                    Some(&(slot, source)) => {
                        let mut atom = ordered[slot].atom(source).clone();
                        if let Some(charge) = query.charge {
                            atom.formal_charge = charge;
                        }
                        if let Some(aromatic) = query.aromatic {
                            atom.aromatic = aromatic;
                        }
                        if let Some(hydrogens) = query.hydrogens {
                            atom.explicit_hs = hydrogens;
                            atom.no_implicit_hs = true;
                        }
                        atom.map_num = query.map_num;
                        if schema.is_attachment_map(query.map_num) && atom.atomic_num > 1 {
                            atom.former_attachment = true;
                        }
                        let id = product.add_atom(atom);
                        placed.insert((slot, source), id);
                        id
                    }
                    None => {
                        let mut atom = Atom::new(query.element.unwrap_or(element::WILDCARD));
                        atom.formal_charge = query.charge.unwrap_or(0);
                        atom.aromatic = query.aromatic == Some(true);
                        if let Some(hydrogens) = query.hydrogens {
                            atom.explicit_hs = hydrogens;
                            atom.no_implicit_hs = true;
                        }
                        atom.map_num = query.map_num;
                        product.add_atom(atom)
                    }
                };
                image_of_template.push(id);
            }

            // Template bonds next, falling back to the underlying reactant's
            // bond order when the template leaves it open
            for t_bond in template.bonds() {
                let (ta, tb) = template.bond_endpoints(t_bond);
                let order = template
                    .bond(t_bond)
                    .order
                    .or_else(|| {
                        let a = atom_of_map.get(&template.atom(ta).map_num)?;
                        let b = atom_of_map.get(&template.atom(tb).map_num)?;
                        (a.0 == b.0).then(|| {
                            let bond = ordered[a.0].bond_between(a.1, b.1)?;
                            Some(ordered[a.0].bond(bond).order)
                        })?
                    })
                    .unwrap_or(BondOrder::Single);
                product.add_bond(
                    image_of_template[ta.index()],
                    image_of_template[tb.index()],
                    Bond::new(order),
                );
            }

            // Carry over unmatched substituents by flooding outward from
            // each anchor without ever crossing another matched atom;
            // whatever hangs off a leaving-group atom is thereby dropped
            for t_atom in template.atoms() {
                let map_num = template.atom(t_atom).map_num;
                let Some(&(slot, source)) = atom_of_map.get(&map_num) else {
                    continue;
                };
                let reactant = &ordered[slot];
                let mut stack = vec![source];
                while let Some(at) = stack.pop() {
                    for neighbor in reactant.neighbors(at).collect::<Vec<_>>() {
                        if matched_sets[slot].contains(&neighbor)
                            || claimed.contains(&(slot, neighbor))
                        {
                            continue;
                        }
                        claimed.insert((slot, neighbor));
                        let id = product.add_atom(reactant.atom(neighbor).clone());
                        placed.insert((slot, neighbor), id);
                        stack.push(neighbor);
                    }
                }
            }

            // Reactant bonds between placed atoms, except anchor-to-anchor
            // pairs, whose bonding the product template alone dictates
            let mut ordered_placed: Vec<_> = placed.iter().map(|(&k, &v)| (k, v)).collect();
            ordered_placed.sort_unstable();
            for ((slot, source), image) in ordered_placed {
                let reactant = &ordered[slot];
                for bond in reactant.bonds_of(source).collect::<Vec<_>>() {
                    let other = reactant.other_end(bond, source);
                    if other <= source {
                        continue;
                    }
                    let Some(&other_image) = placed.get(&(slot, other)) else {
                        continue;
                    };
                    let both_anchors = matched_sets[slot].contains(&source)
                        && matched_sets[slot].contains(&other);
                    if both_anchors {
                        continue;
                    }
                    product.add_bond(
                        image,
                        other_image,
                        Bond::new(reactant.bond(bond).order),
                    );
                }
            }

            // Finally, stamp the provenance classification onto the bonds
            // this reaction formed or modified
            for bond in product.bonds().collect::<Vec<_>>() {
                let (a, b) = product.bond_endpoints(bond);
                let (ma, mb) = (product.atom(a).map_num, product.atom(b).map_num);
                if ma != 0 && mb != 0 {
                    if let Some(change) = info.classify(ma, mb) {
                        product.bond_mut(bond).change = Some(change);
                    }
                }
            }

            outputs.push(product);
        }
        outputs
    }
}

#[derive(Copy, Clone, Debug)]
pub struct PropagateOptions {
    /// Strip product map labels once fragmentation no longer needs them
    pub clear_map_nums: bool,
    pub sanitize: SanitizeLevel,
}

impl Default for PropagateOptions {
    fn default() -> Self {
        Self {
            clear_map_nums: true,
            sanitize: SanitizeLevel::Full,
        }
    }
}

/// One round of chain growth: the adducts the reaction produced, and the
/// monomer-scale fragments recovered from them (the next round's reactants)
#[derive(Clone, Debug)]
pub struct PropagationStep {
    pub products: Vec<Molecule>,
    pub fragments: Vec<Molecule>,
}

/// Drives repeated react-then-fragment cycles to exhaustion, modeling
/// step-growth polymerization
#[derive(Clone, Debug)]
pub struct PolymerizationReactor {
    reactor: Reactor,
}

impl PolymerizationReactor {
    #[must_use]
    pub fn new(schema: ReactionSchema) -> Self {
        Self {
            reactor: Reactor::new(schema),
        }
    }

    #[must_use]
    pub fn reactor(&self) -> &Reactor {
        &self.reactor
    }

    /// Keep reacting and re-fragmenting, yielding each step until no further
    /// reaction is possible. Running out of compatible reactants is the
    /// loop's natural end, not an error; anything else ends the iteration
    /// with that error as its final item. Restart only by calling this again
    /// with the original monomers.
    pub fn propagate<S: FragmentationStrategy>(
        &self,
        monomers: Vec<Molecule>,
        strategy: S,
        options: PropagateOptions,
    ) -> Propagation<'_, S> {
        Propagation {
            reactor: &self.reactor,
            strategy,
            options,
            pool: monomers,
            halted: false,
        }
    }
}

pub struct Propagation<'r, S> {
    reactor: &'r Reactor,
    strategy: S,
    options: PropagateOptions,
    pool: Vec<Molecule>,
    halted: bool,
}

impl<S: FragmentationStrategy> Iterator for Propagation<'_, S> {
    type Item = Result<PropagationStep>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.halted {
            return None;
        }

        let react_options = ReactOptions {
            repetitions: 1,
            keep_map_labels: true,
            sanitize: self.options.sanitize,
        };
        let mut products = match self.reactor.react(&self.pool, &react_options) {
            Ok(products) => products,
            // No compatible pairing left: the chain has stopped growing
            Err(RetortError::ReactantMismatch) => {
                self.halted = true;
                return None;
            }
            Err(error) => {
                self.halted = true;
                return Some(Err(error));
            }
        };

        let mut fragments = Vec::new();
        for product in &mut products {
            let pieces = match self.strategy.produce_fragments(product) {
                Ok(pieces) => pieces,
                Err(error) => {
                    self.halted = true;
                    return Some(Err(error));
                }
            };
            for mut piece in pieces {
                // Stale map numbers and bond marks would corrupt the next
                // round's provenance derivation
                piece.clear_reaction_annotations();
                sanitize::recompute_implicit_hs(&mut piece);
                fragments.push(piece);
            }
            // Deferred until after fragmentation, which needs the labels
            if self.options.clear_map_nums {
                product.clear_map_nums();
            }
        }

        self.pool = fragments.clone();
        Some(Ok(PropagationStep {
            products,
            fragments,
        }))
    }
}
