//! Static census-info resource.

use rmcp::ErrorData;
use rmcp::model::{AnnotateAble, RawResource, ReadResourceResult, Resource, ResourceContents};
use serde_json::json;

pub const CENSUS_INFO_URI: &str = "resource://cellxgene_census-info";

const CENSUS_INFO_NAME: &str = "cellxgene_census-info";

const CENSUS_INFO_TEXT: &str = r"CELLxGENE Census Information:

The CELLxGENE Census is a comprehensive collection of single-cell RNA sequencing data from CZ CELLxGENE Discover.

Available Organisms:
- 'Homo sapiens' (human)
- 'Mus musculus' (mouse)

Key Metadata Fields:
Observation (cell) metadata:
- cell_type: Cell type annotation
- tissue: Tissue of origin
- disease: Disease state
- sex: Biological sex
- assay: Sequencing assay used
- suspension_type: Cell or nucleus
- self_reported_ethnicity: Self-reported ethnicity (human only)
- development_stage: Developmental stage
- is_primary_data: Whether the cell is the canonical copy across datasets

Variable (gene) metadata:
- feature_id: Ensembl gene ID
- feature_name: Gene symbol
- feature_length: Gene length

Common Query Patterns:
1. Filter by cell type: cell_type == 'T cell'
2. Filter by tissue: tissue == 'lung'
3. Filter by disease: disease == 'COVID-19'
4. Combine filters: cell_type == 'T cell' and tissue == 'lung'
5. Filter genes: feature_name in ['CD4', 'CD8A', 'CD3E']

Note: Queries can return large amounts of data. Use filters and limits to keep results small.
";

pub fn list() -> Vec<Resource> {
    let mut raw = RawResource::new(CENSUS_INFO_URI, CENSUS_INFO_NAME);
    raw.description = Some(
        "Census organisms, metadata fields and common value_filter patterns.".to_string(),
    );
    raw.mime_type = Some("text/plain".to_string());
    vec![raw.no_annotation()]
}

pub fn read(uri: &str) -> Result<ReadResourceResult, ErrorData> {
    if uri != CENSUS_INFO_URI {
        return Err(ErrorData::resource_not_found(
            format!("unknown resource: {uri}"),
            Some(json!({ "uri": uri })),
        ));
    }
    Ok(ReadResourceResult {
        contents: vec![ResourceContents::text(CENSUS_INFO_TEXT, uri)],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_the_census_info_resource() {
        let resources = list();
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].raw.uri, CENSUS_INFO_URI);
        assert_eq!(resources[0].raw.mime_type.as_deref(), Some("text/plain"));
    }

    #[test]
    fn reads_static_text() {
        let result = read(CENSUS_INFO_URI).expect("resource exists");
        match &result.contents[0] {
            ResourceContents::TextResourceContents { text, .. } => {
                assert!(text.contains("Homo sapiens"));
                assert!(text.contains("feature_name in ['CD4', 'CD8A', 'CD3E']"));
            }
            other => panic!("expected text contents, got {other:?}"),
        }
    }

    #[test]
    fn unknown_uri_is_not_found() {
        let err = read("resource://cellxgene_other").expect_err("unknown resource");
        assert_eq!(err.code, rmcp::model::ErrorCode::RESOURCE_NOT_FOUND);
    }
}
