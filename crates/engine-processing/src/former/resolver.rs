use model::core::{
    data_type::{DataType, TypeModifier},
    input::{InputFn, resolve_input},
    shape::Shape,
};

/// Input function and type metadata of one column that receives data.
#[derive(Clone)]
pub struct ResolvedColumn {
    /// 0-based position in the shape.
    pub position: usize,
    pub name: String,
    pub data_type: DataType,
    pub modifier: TypeModifier,
    pub input: InputFn,
}

impl std::fmt::Debug for ResolvedColumn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedColumn")
            .field("position", &self.position)
            .field("name", &self.name)
            .field("data_type", &self.data_type)
            .field("modifier", &self.modifier)
            .finish()
    }
}

pub struct TypedColumnResolver;

impl TypedColumnResolver {
    /// Resolves the input function of every live column, in field order.
    /// Dropped columns never receive data and are left out.
    pub fn resolve(shape: &Shape) -> Result<Vec<ResolvedColumn>, String> {
        shape
            .columns()
            .iter()
            .enumerate()
            .filter(|(_, column)| !column.dropped)
            .map(|(position, column)| {
                let input = resolve_input(&column.data_type)
                    .map_err(|reason| format!("column \"{}\": {reason}", column.name))?;
                Ok(ResolvedColumn {
                    position,
                    name: column.name.clone(),
                    data_type: column.data_type.clone(),
                    modifier: column.modifier,
                    input,
                })
            })
            .collect()
    }
}
