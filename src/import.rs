use crate::grid::SheetGrid;
use crate::plan::{FileImportPlan, ImportFileError};
use crate::row::parse_row;
use crate::subgroup::SubgroupCatalog;
use actix::prelude::*;
use estoque_types::{CatalogRepository, InventoryItem};
use log_error::LogError;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Existing-code lookups batch this many keys per query.
pub const RESOLVE_CHUNK: usize = 1000;
/// Records written per transaction. A failed chunk loses at most this many.
pub const UPSERT_CHUNK: usize = 500;

const PROGRESS_ROW_BATCH: usize = 200;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ImportStatus {
    #[default]
    Idle,
    Running,
    Completed,
}

#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportProgress {
    pub status: ImportStatus,
    pub current_file: Option<String>,
    pub processed_rows: usize,
    pub total_rows: usize,
    pub inserted: usize,
    pub updated: usize,
    pub failed: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub files_processed: usize,
    pub total_inserted: usize,
    pub total_updated: usize,
    pub total_errors: usize,
}

/// An uploaded file staged for commit, with the preview already computed.
pub struct LoadedFile {
    pub name: String,
    pub grid: SheetGrid,
    pub plan: FileImportPlan,
}

#[derive(Default)]
struct FileCounts {
    inserted: usize,
    updated: usize,
    failed: usize,
}

/// Run one committed import over the staged files. Never fails as a whole:
/// storage errors are charged to the failed counter per chunk and the job
/// moves on to the next chunk.
pub async fn run_job(
    files: Vec<LoadedFile>,
    catalog: Arc<dyn CatalogRepository>,
    progress: Arc<RwLock<ImportProgress>>,
    stop: Arc<AtomicBool>,
) -> ImportSummary {
    let total_rows = files.iter().map(|f| f.grid.rows.len()).sum();
    {
        let mut p = progress.write().await;
        *p = ImportProgress {
            status: ImportStatus::Running,
            total_rows,
            ..ImportProgress::default()
        };
    }

    let mut subgroups = SubgroupCatalog::default();
    subgroups.seed(
        catalog
            .list_subgroups()
            .await
            .log_error("Unable to seed subgroups from catalog")
            .unwrap_or_default(),
    );

    let mut summary = ImportSummary::default();
    for file in files {
        if stop.load(Ordering::SeqCst) {
            log::info!("Import stopped before file {}", file.name);
            break;
        }
        log::info!("Importing {} ({} rows)", file.name, file.grid.rows.len());
        progress.write().await.current_file = Some(file.name.clone());
        let counts =
            import_file(&file, catalog.as_ref(), &mut subgroups, &progress, &stop).await;
        summary.files_processed += 1;
        summary.total_inserted += counts.inserted;
        summary.total_updated += counts.updated;
        summary.total_errors += counts.failed;
    }

    {
        let mut p = progress.write().await;
        p.status = ImportStatus::Completed;
        p.current_file = None;
    }
    log::info!(
        "Import finished: {} inserted, {} updated, {} failed across {} file(s)",
        summary.total_inserted,
        summary.total_updated,
        summary.total_errors,
        summary.files_processed
    );
    summary
}

async fn import_file(
    file: &LoadedFile,
    catalog: &dyn CatalogRepository,
    subgroups: &mut SubgroupCatalog,
    progress: &Arc<RwLock<ImportProgress>>,
    stop: &Arc<AtomicBool>,
) -> FileCounts {
    // Last occurrence of a duplicated code wins, at the position where the
    // code first appeared.
    let mut order: Vec<String> = Vec::new();
    let mut by_code: HashMap<String, InventoryItem> = HashMap::new();
    let mut parsed = 0usize;
    for (idx, row) in file.grid.rows.iter().enumerate() {
        parsed += 1;
        if parsed % PROGRESS_ROW_BATCH == 0 {
            progress.write().await.processed_rows += PROGRESS_ROW_BATCH;
        }
        let item = parse_row(row, &file.plan.mapping, idx, subgroups);
        if !item.is_importable() {
            continue;
        }
        let code = item.code.clone();
        if by_code.insert(code.clone(), item).is_none() {
            order.push(code);
        }
    }
    progress.write().await.processed_rows += parsed % PROGRESS_ROW_BATCH;

    let mut existing: HashSet<String> = HashSet::new();
    for chunk in order.chunks(RESOLVE_CHUNK) {
        match catalog.find_existing_codes(chunk).await {
            Ok(found) => existing.extend(found),
            // Records resolve as inserts then; counters skew but the data
            // still lands.
            Err(err) => log::error!("Unable to resolve existing codes: {err:#}"),
        }
    }

    let items: Vec<InventoryItem> = order
        .iter()
        .filter_map(|code| by_code.remove(code))
        .collect();

    let mut counts = FileCounts::default();
    for chunk in items.chunks(UPSERT_CHUNK) {
        if stop.load(Ordering::SeqCst) {
            log::info!("Import stopped mid-file {}", file.name);
            break;
        }
        match catalog.upsert_chunk(chunk.to_vec()).await {
            Ok(()) => {
                let mut inserted = 0;
                let mut updated = 0;
                for item in chunk {
                    if existing.contains(&item.code) {
                        updated += 1;
                    } else {
                        inserted += 1;
                        existing.insert(item.code.clone());
                    }
                }
                counts.inserted += inserted;
                counts.updated += updated;
                let mut p = progress.write().await;
                p.inserted += inserted;
                p.updated += updated;
            }
            Err(err) => {
                log::error!(
                    "Unable to upsert chunk of {} in {}: {err:#}",
                    chunk.len(),
                    file.name
                );
                counts.failed += chunk.len();
                progress.write().await.failed += chunk.len();
            }
        }
        tokio::task::yield_now().await;
    }
    counts
}

#[derive(Message)]
#[rtype(result = "Result<FileImportPlan, ImportFileError>")]
pub struct AddFile {
    pub name: String,
    pub grid: SheetGrid,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct DiscardFile(pub String);

#[derive(Message)]
#[rtype(result = "Vec<FileImportPlan>")]
pub struct GetPlans;

#[derive(Message)]
#[rtype(result = "Result<(), anyhow::Error>")]
pub struct Commit;

#[derive(Message)]
#[rtype(result = "ProgressSnapshot")]
pub struct GetProgress;

#[derive(Message)]
#[rtype(result = "()")]
pub struct Stop;

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    pub progress: ImportProgress,
    pub summary: Option<ImportSummary>,
}

/// Owns the staged files and the lifecycle of the single import job. One
/// job at a time; a second commit while one runs is rejected.
pub struct ImportService {
    catalog: Arc<dyn CatalogRepository>,
    files: Vec<LoadedFile>,
    progress: Arc<RwLock<ImportProgress>>,
    summary: Arc<RwLock<Option<ImportSummary>>>,
    stop: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
}

impl ImportService {
    pub fn new(catalog: Arc<dyn CatalogRepository>) -> Self {
        Self {
            catalog,
            files: Vec::new(),
            progress: Arc::new(RwLock::new(ImportProgress::default())),
            summary: Arc::new(RwLock::new(None)),
            stop: Arc::new(AtomicBool::new(false)),
            running: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl Actor for ImportService {
    type Context = Context<Self>;
}

impl Handler<AddFile> for ImportService {
    type Result = Result<FileImportPlan, ImportFileError>;

    fn handle(&mut self, AddFile { name, grid }: AddFile, _: &mut Self::Context) -> Self::Result {
        let plan = FileImportPlan::build(&name, &grid)?;
        // Re-uploading a file replaces its previous staging.
        self.files.retain(|f| f.name != name);
        self.files.push(LoadedFile {
            name,
            grid,
            plan: plan.clone(),
        });
        Ok(plan)
    }
}

impl Handler<DiscardFile> for ImportService {
    type Result = ();

    fn handle(&mut self, DiscardFile(name): DiscardFile, _: &mut Self::Context) {
        self.files.retain(|f| f.name != name);
    }
}

impl Handler<GetPlans> for ImportService {
    type Result = MessageResult<GetPlans>;

    fn handle(&mut self, _: GetPlans, _: &mut Self::Context) -> Self::Result {
        MessageResult(self.files.iter().map(|f| f.plan.clone()).collect())
    }
}

impl Handler<Commit> for ImportService {
    type Result = Result<(), anyhow::Error>;

    fn handle(&mut self, _: Commit, _: &mut Self::Context) -> Self::Result {
        if self.files.is_empty() {
            return Err(anyhow::anyhow!("Nenhum arquivo carregado"));
        }
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(anyhow::anyhow!("Importação já em andamento"));
        }
        self.stop.store(false, Ordering::SeqCst);
        let files = std::mem::take(&mut self.files);
        let catalog = self.catalog.clone();
        let progress = self.progress.clone();
        let summary = self.summary.clone();
        let stop = self.stop.clone();
        let running = self.running.clone();
        actix::spawn(async move {
            *summary.write().await = None;
            let result = run_job(files, catalog, progress, stop).await;
            *summary.write().await = Some(result);
            running.store(false, Ordering::SeqCst);
        });
        Ok(())
    }
}

impl Handler<GetProgress> for ImportService {
    type Result = ResponseActFuture<Self, ProgressSnapshot>;

    fn handle(&mut self, _: GetProgress, _: &mut Self::Context) -> Self::Result {
        let progress = self.progress.clone();
        let summary = self.summary.clone();
        Box::pin(
            async move {
                ProgressSnapshot {
                    progress: progress.read().await.clone(),
                    summary: summary.read().await.clone(),
                }
            }
            .into_actor(self),
        )
    }
}

impl Handler<Stop> for ImportService {
    type Result = ();

    fn handle(&mut self, _: Stop, _: &mut Self::Context) {
        self.stop.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::read_csv_grid;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use typesafe_repository::async_ops::{Get, List, Save};
    use typesafe_repository::prelude::*;
    use typesafe_repository::IdentityOf;

    #[derive(Default)]
    struct MemoryCatalogRepository {
        store: Mutex<HashMap<String, InventoryItem>>,
        upsert_calls: AtomicUsize,
        fail_upsert_calls: Vec<usize>,
    }

    impl Repository<InventoryItem> for MemoryCatalogRepository {
        type Error = anyhow::Error;
    }

    #[async_trait]
    impl Save<InventoryItem> for MemoryCatalogRepository {
        async fn save(&self, item: InventoryItem) -> Result<(), Self::Error> {
            self.store
                .lock()
                .expect("lock")
                .insert(item.code.clone(), item);
            Ok(())
        }
    }

    #[async_trait]
    impl Get<InventoryItem> for MemoryCatalogRepository {
        async fn get_one(
            &self,
            id: &IdentityOf<InventoryItem>,
        ) -> Result<Option<InventoryItem>, Self::Error> {
            Ok(self.store.lock().expect("lock").get(id).cloned())
        }
    }

    #[async_trait]
    impl List<InventoryItem> for MemoryCatalogRepository {
        async fn list(&self) -> Result<Vec<InventoryItem>, Self::Error> {
            Ok(self.store.lock().expect("lock").values().cloned().collect())
        }
    }

    #[async_trait]
    impl CatalogRepository for MemoryCatalogRepository {
        async fn find_existing_codes(
            &self,
            codes: &[String],
        ) -> Result<HashSet<String>, Self::Error> {
            let store = self.store.lock().expect("lock");
            Ok(codes.iter().filter(|c| store.contains_key(*c)).cloned().collect())
        }

        async fn upsert_chunk(&self, items: Vec<InventoryItem>) -> Result<(), Self::Error> {
            let call = self.upsert_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_upsert_calls.contains(&call) {
                return Err(anyhow!("disk full"));
            }
            let mut store = self.store.lock().expect("lock");
            for item in items {
                store.insert(item.code.clone(), item);
            }
            Ok(())
        }

        async fn list_subgroups(&self) -> Result<Vec<String>, Self::Error> {
            let store = self.store.lock().expect("lock");
            let mut subgroups: Vec<String> =
                store.values().filter_map(|i| i.subgroup.clone()).collect();
            subgroups.sort();
            subgroups.dedup();
            Ok(subgroups)
        }
    }

    fn loaded_file(name: &str, csv: &str) -> LoadedFile {
        let grid = read_csv_grid(csv.as_bytes()).expect("csv");
        let plan = FileImportPlan::build(name, &grid).expect("plan");
        LoadedFile {
            name: name.to_string(),
            grid,
            plan,
        }
    }

    async fn run(
        files: Vec<LoadedFile>,
        catalog: Arc<MemoryCatalogRepository>,
    ) -> (ImportSummary, ImportProgress) {
        let progress = Arc::new(RwLock::new(ImportProgress::default()));
        let stop = Arc::new(AtomicBool::new(false));
        let summary = run_job(files, catalog, progress.clone(), stop).await;
        let progress = progress.read().await.clone();
        (summary, progress)
    }

    #[tokio::test]
    async fn last_duplicate_wins() {
        let catalog = Arc::new(MemoryCatalogRepository::default());
        let file = loaded_file(
            "dup.csv",
            "Código;Descrição;Preço de Venda\n\
             001;Arroz;10,00\n\
             002;Feijão;8,00\n\
             001;Arroz Integral;12,00\n",
        );
        let (summary, _) = run(vec![file], catalog.clone()).await;

        assert_eq!(2, summary.total_inserted);
        assert_eq!(0, summary.total_updated);
        let store = catalog.store.lock().expect("lock");
        assert_eq!("Arroz Integral", store["001"].name);
        assert_eq!(dec!(12.00), store["001"].sale_price);
    }

    #[tokio::test]
    async fn failed_chunk_is_skipped_and_the_job_continues() {
        let catalog = Arc::new(MemoryCatalogRepository {
            fail_upsert_calls: vec![1],
            ..MemoryCatalogRepository::default()
        });
        let mut csv = String::from("Código;Descrição\n");
        for i in 0..1200 {
            csv.push_str(&format!("{i};Produto {i}\n"));
        }
        let (summary, progress) = run(vec![loaded_file("grande.csv", &csv)], catalog.clone()).await;

        assert_eq!(500, summary.total_errors);
        assert_eq!(700, summary.total_inserted);
        assert_eq!(700, catalog.store.lock().expect("lock").len());
        assert_eq!(500, progress.failed);
        assert_eq!(ImportStatus::Completed, progress.status);
    }

    #[tokio::test]
    async fn multi_file_job_reports_combined_totals() {
        let catalog = Arc::new(MemoryCatalogRepository::default());
        let mut first = String::from("Código;Descrição\n");
        for i in 0..600 {
            first.push_str(&format!("A{i};Produto {i}\n"));
        }
        let mut second = String::from("Código;Descrição\n");
        for i in 0..350 {
            second.push_str(&format!("B{i};Produto {i}\n"));
        }
        // Rows with neither code nor name are skipped silently.
        for _ in 0..50 {
            second.push_str(";\n");
        }
        let files = vec![
            loaded_file("primeiro.csv", &first),
            loaded_file("segundo.csv", &second),
        ];
        let (summary, progress) = run(files, catalog.clone()).await;

        assert_eq!(2, summary.files_processed);
        assert_eq!(950, summary.total_inserted);
        assert_eq!(0, summary.total_errors);
        assert_eq!(1000, progress.total_rows);
        assert_eq!(1000, progress.processed_rows);
        assert_eq!(950, catalog.store.lock().expect("lock").len());
    }

    #[tokio::test]
    async fn second_upload_of_a_code_counts_as_update() {
        let catalog = Arc::new(MemoryCatalogRepository::default());
        catalog
            .save(InventoryItem {
                code: "001".to_string(),
                name: "Arroz".to_string(),
                ..InventoryItem::default()
            })
            .await
            .expect("save");
        let file = loaded_file(
            "atualiza.csv",
            "Código;Descrição\n001;Arroz Tipo 1\n002;Feijão\n",
        );
        let (summary, _) = run(vec![file], catalog.clone()).await;

        assert_eq!(1, summary.total_updated);
        assert_eq!(1, summary.total_inserted);
        assert_eq!("Arroz Tipo 1", catalog.store.lock().expect("lock")["001"].name);
    }

    #[tokio::test]
    async fn catalog_spelling_wins_over_upload_variants() {
        let catalog = Arc::new(MemoryCatalogRepository::default());
        catalog
            .save(InventoryItem {
                code: "000".to_string(),
                name: "Semente".to_string(),
                subgroup: Some("Grãos".to_string()),
                ..InventoryItem::default()
            })
            .await
            .expect("save");
        let file = loaded_file(
            "graos.csv",
            "Código;Descrição;Subgrupo\n001;Arroz;GRAOS\n002;Feijão;graos\n",
        );
        run(vec![file], catalog.clone()).await;

        let store = catalog.store.lock().expect("lock");
        assert_eq!(Some("Grãos".to_string()), store["001"].subgroup);
        assert_eq!(Some("Grãos".to_string()), store["002"].subgroup);
    }

    #[tokio::test]
    async fn subgroups_converge_across_files() {
        let catalog = Arc::new(MemoryCatalogRepository::default());
        let files = vec![
            loaded_file(
                "um.csv",
                "Código;Descrição;Subgrupo\n001;Polpa;Polpa De Fruta\n",
            ),
            loaded_file(
                "dois.csv",
                "Código;Descrição;Subgrupo\n002;Polpa Uva;POLPA  DE FRUTA\n",
            ),
        ];
        run(files, catalog.clone()).await;

        let store = catalog.store.lock().expect("lock");
        assert_eq!(store["001"].subgroup, store["002"].subgroup);
        // New keys register as uppercase(trim(raw)).
        assert_eq!(Some("POLPA DE FRUTA".to_string()), store["001"].subgroup);
    }

    #[tokio::test]
    async fn stop_flag_halts_before_the_next_chunk() {
        let catalog = Arc::new(MemoryCatalogRepository::default());
        let file = loaded_file("parado.csv", "Código;Descrição\n001;Arroz\n");
        let progress = Arc::new(RwLock::new(ImportProgress::default()));
        let stop = Arc::new(AtomicBool::new(true));
        let summary = run_job(vec![file], catalog.clone(), progress.clone(), stop).await;

        assert_eq!(0, summary.files_processed);
        assert!(catalog.store.lock().expect("lock").is_empty());
        assert_eq!(ImportStatus::Completed, progress.read().await.status);
    }

    #[actix_rt::test]
    async fn service_stages_replaces_and_discards_files() {
        let service = ImportService::new(Arc::new(MemoryCatalogRepository::default())).start();
        let grid = read_csv_grid(b"Codigo;Descricao\n001;Arroz\n").expect("csv");
        let plan = service
            .send(AddFile {
                name: "a.csv".to_string(),
                grid: grid.clone(),
            })
            .await
            .expect("send")
            .expect("plan");
        assert_eq!(1, plan.total_rows);

        // Same name replaces, not duplicates.
        service
            .send(AddFile {
                name: "a.csv".to_string(),
                grid,
            })
            .await
            .expect("send")
            .expect("plan");
        assert_eq!(1, service.send(GetPlans).await.expect("send").len());

        service
            .send(DiscardFile("a.csv".to_string()))
            .await
            .expect("send");
        assert!(service.send(GetPlans).await.expect("send").is_empty());

        let err = service.send(Commit).await.expect("send");
        assert!(err.is_err());
    }

    #[actix_rt::test]
    async fn committed_job_reaches_completion() {
        let catalog = Arc::new(MemoryCatalogRepository::default());
        let service = ImportService::new(catalog.clone()).start();
        let grid = read_csv_grid(b"Codigo;Descricao\n001;Arroz\n002;Feijao\n").expect("csv");
        service
            .send(AddFile {
                name: "a.csv".to_string(),
                grid,
            })
            .await
            .expect("send")
            .expect("plan");
        service.send(Commit).await.expect("send").expect("commit");

        let mut snapshot = service.send(GetProgress).await.expect("send");
        for _ in 0..50 {
            if snapshot.summary.is_some() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            snapshot = service.send(GetProgress).await.expect("send");
        }
        let summary = snapshot.summary.expect("summary");
        assert_eq!(2, summary.total_inserted);
        assert_eq!(ImportStatus::Completed, snapshot.progress.status);
        assert_eq!(2, catalog.store.lock().expect("lock").len());
    }
}
