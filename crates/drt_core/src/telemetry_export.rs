//! Telemetry export: columnar service records for offline analysis.

use std::error::Error;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, StringArray, UInt32Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;

use crate::telemetry::SimTelemetry;

fn f64_field(name: &'static str) -> Field {
    Field::new(name, DataType::Float64, false)
}

fn utf8_field(name: &'static str) -> Field {
    Field::new(name, DataType::Utf8, false)
}

fn write_record_batch<P: AsRef<Path>>(
    path: P,
    schema: Schema,
    arrays: Vec<ArrayRef>,
) -> Result<(), Box<dyn Error>> {
    let schema = Arc::new(schema);
    let batch = RecordBatch::try_new(schema.clone(), arrays)?;
    let file = File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, schema, None)?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

/// Write every accepted service as one parquet row.
pub fn write_services_parquet<P: AsRef<Path>>(
    path: P,
    telemetry: &SimTelemetry,
) -> Result<(), Box<dyn Error>> {
    let n = telemetry.services.len();
    let mut passengers = Vec::with_capacity(n);
    let mut vehicles = Vec::with_capacity(n);
    let mut npass = Vec::with_capacity(n);
    let mut issue_times = Vec::with_capacity(n);
    let mut pickups = Vec::with_capacity(n);
    let mut dropoffs = Vec::with_capacity(n);
    let mut cost_increments = Vec::with_capacity(n);

    for record in &telemetry.services {
        passengers.push(record.passenger_id.clone());
        vehicles.push(record.vehicle_id.clone());
        npass.push(record.npass);
        issue_times.push(record.issue_time);
        pickups.push(record.pickup_at);
        dropoffs.push(record.dropoff_at);
        cost_increments.push(record.cost_increment);
    }

    let schema = Schema::new(vec![
        utf8_field("passenger_id"),
        utf8_field("vehicle_id"),
        Field::new("npass", DataType::UInt32, false),
        f64_field("issue_time"),
        f64_field("pickup_at"),
        f64_field("dropoff_at"),
        f64_field("cost_increment"),
    ]);

    let arrays: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from(passengers)),
        Arc::new(StringArray::from(vehicles)),
        Arc::new(UInt32Array::from(npass)),
        Arc::new(Float64Array::from(issue_times)),
        Arc::new(Float64Array::from(pickups)),
        Arc::new(Float64Array::from(dropoffs)),
        Arc::new(Float64Array::from(cost_increments)),
    ];

    write_record_batch(path, schema, arrays)
}

/// Write every vehicle arrival as one parquet row.
pub fn write_arrivals_parquet<P: AsRef<Path>>(
    path: P,
    telemetry: &SimTelemetry,
) -> Result<(), Box<dyn Error>> {
    let n = telemetry.arrivals.len();
    let mut vehicles = Vec::with_capacity(n);
    let mut stops = Vec::with_capacity(n);
    let mut minutes = Vec::with_capacity(n);
    for record in &telemetry.arrivals {
        vehicles.push(record.vehicle_id.clone());
        stops.push(record.stop_id.clone());
        minutes.push(record.arrived_at);
    }

    let schema = Schema::new(vec![
        utf8_field("vehicle_id"),
        utf8_field("stop_id"),
        f64_field("arrived_at"),
    ]);
    let arrays: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from(vehicles)),
        Arc::new(StringArray::from(stops)),
        Arc::new(Float64Array::from(minutes)),
    ];
    write_record_batch(path, schema, arrays)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::{ServiceRecord, StopArrivalRecord};

    #[test]
    fn parquet_files_are_written() {
        let mut telemetry = SimTelemetry::default();
        telemetry.services.push(ServiceRecord {
            passenger_id: "alice".into(),
            vehicle_id: "bus1".into(),
            npass: 1,
            issue_time: 1.0,
            pickup_at: 12.0,
            dropoff_at: 15.5,
            cost_increment: 3.0,
        });
        telemetry.arrivals.push(StopArrivalRecord {
            vehicle_id: "bus1".into(),
            stop_id: "a".into(),
            arrived_at: 12.0,
        });

        let dir = tempfile::tempdir().unwrap();
        let services = dir.path().join("services.parquet");
        let arrivals = dir.path().join("arrivals.parquet");
        write_services_parquet(&services, &telemetry).unwrap();
        write_arrivals_parquet(&arrivals, &telemetry).unwrap();
        assert!(services.metadata().unwrap().len() > 0);
        assert!(arrivals.metadata().unwrap().len() > 0);
    }
}
